//! Command handlers behind the `azdo-provider` binary.
//!
//! Resource files are TOML:
//!
//! ```toml
//! type = "azuredevops_serviceendpoint_azurecr"
//!
//! [config]
//! project_id = "..."
//! service_endpoint_name = "registry"
//! ```
//!
//! State files are JSON documents holding the resource type, its id and its
//! attributes. Results go to the given writer (stdout in the binary); logs go
//! elsewhere.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::models::Command;
use crate::provider::Provider;
use crate::resource_data::ResourceData;

/// A resource file: type name plus configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceFile {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub config: toml::Table,
}

impl ResourceFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read resource file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse resource file: {}", path.display()))
    }

    /// The configuration as the attribute map resources work on.
    pub fn attributes(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(&self.config)? {
            Value::Object(map) => Ok(map),
            other => bail!("resource configuration must be a table, found {other}"),
        }
    }
}

/// What the provider knows about one managed entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(flatten)]
    pub data: ResourceData,
}

impl StateFile {
    /// Loads a state file, `None` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        Ok(Some(state))
    }

    fn require(path: &Path) -> Result<Self> {
        Self::load(path)?.with_context(|| format!("State file not found: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content + "\n")
            .with_context(|| format!("Failed to write state file: {}", path.display()))
    }
}

/// Whether the command talks to Azure DevOps.
pub fn requires_connection(command: &Command) -> bool {
    !matches!(command, Command::Validate { .. } | Command::Schema { .. })
}

/// Runs one command, writing its result to `out`.
pub async fn execute(provider: &Provider, command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Validate { file } => validate(provider, &file, out),
        Command::Schema { resource_type } => schema(provider, resource_type.as_deref(), out),
        Command::Apply { file, state } => apply(provider, &file, state.as_deref(), out).await,
        Command::Read { state } => read(provider, &state, out).await,
        Command::Destroy { state } => destroy(provider, &state, out).await,
        Command::Import {
            resource_type,
            id,
            state,
        } => import(provider, &resource_type, &id, state.as_deref(), out).await,
    }
}

fn validate(provider: &Provider, file: &Path, out: &mut impl Write) -> Result<()> {
    let resource = ResourceFile::load(file)?;
    provider.validate(&resource.resource_type, resource.attributes()?)?;
    writeln!(out, "{}: configuration is valid", resource.resource_type)?;
    Ok(())
}

fn schema(provider: &Provider, resource_type: Option<&str>, out: &mut impl Write) -> Result<()> {
    let rendered = match resource_type {
        Some(name) => serde_json::to_value(provider.schema(name)?)?,
        None => {
            let mut all = Map::new();
            for name in provider.resource_types() {
                all.insert(name.to_string(), serde_json::to_value(provider.schema(name)?)?);
            }
            Value::Object(all)
        }
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&rendered)?)?;
    Ok(())
}

/// Writes the state to `path`, or prints it when no path was given.
fn emit_state(state: &StateFile, path: Option<&Path>, out: &mut impl Write) -> Result<()> {
    match path {
        Some(path) => state.save(path),
        None => {
            writeln!(out, "{}", serde_json::to_string_pretty(state)?)?;
            Ok(())
        }
    }
}

async fn apply(
    provider: &Provider,
    file: &Path,
    state_path: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    let resource = ResourceFile::load(file)?;
    let prior = match state_path {
        Some(path) => StateFile::load(path)?,
        None => None,
    };
    if let Some(prior) = &prior
        && prior.resource_type != resource.resource_type
    {
        bail!(
            "state holds a {} but the resource file declares a {}",
            prior.resource_type,
            resource.resource_type
        );
    }

    let outcome = provider
        .apply(
            &resource.resource_type,
            prior.map(|p| p.data),
            resource.attributes()?,
        )
        .await?;
    info!(action = %outcome.action, id = outcome.state.id(), "apply finished");

    let state = StateFile {
        resource_type: resource.resource_type,
        data: outcome.state,
    };
    if state_path.is_some() {
        writeln!(
            out,
            "{} {}: {}",
            state.resource_type,
            state.data.id().unwrap_or_default(),
            outcome.action
        )?;
    }
    emit_state(&state, state_path, out)
}

async fn read(provider: &Provider, state_path: &Path, out: &mut impl Write) -> Result<()> {
    let prior = StateFile::require(state_path)?;
    let data = provider.read(&prior.resource_type, prior.data).await?;

    if data.id().is_none() {
        writeln!(out, "{}: no longer exists", prior.resource_type)?;
    } else {
        writeln!(
            out,
            "{} {}: refreshed",
            prior.resource_type,
            data.id().unwrap_or_default()
        )?;
    }
    StateFile {
        resource_type: prior.resource_type,
        data,
    }
    .save(state_path)
}

async fn destroy(provider: &Provider, state_path: &Path, out: &mut impl Write) -> Result<()> {
    let prior = StateFile::require(state_path)?;
    let id = prior.data.id().unwrap_or_default().to_string();
    provider.delete(&prior.resource_type, prior.data).await?;

    fs::remove_file(state_path)
        .with_context(|| format!("Failed to remove state file: {}", state_path.display()))?;
    debug!(path = %state_path.display(), "state file removed");
    writeln!(out, "{} {id}: destroyed", prior.resource_type)?;
    Ok(())
}

async fn import(
    provider: &Provider,
    resource_type: &str,
    id: &str,
    state_path: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    if let Some(path) = state_path
        && path.exists()
    {
        bail!("State file already exists: {}", path.display());
    }

    let data = provider.import(resource_type, id).await?;
    let state = StateFile {
        resource_type: resource_type.to_string(),
        data,
    };
    if state_path.is_some() {
        writeln!(
            out,
            "{resource_type} {}: imported",
            state.data.id().unwrap_or_default()
        )?;
    }
    emit_state(&state, state_path, out)
}
