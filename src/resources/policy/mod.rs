//! Branch policy resources.
//!
//! Every branch policy type shares the same lifecycle and the same base
//! schema: a project, the `enabled`/`blocking` flags and a single `settings`
//! block whose `scope` list selects the repositories and refs the policy
//! applies to. A policy type only contributes its extra `settings` keys and a
//! pair of flatten/expand functions, see [`PolicyCrudArgs`].

pub mod status_check;
pub mod types;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::Resource;
use crate::api::AzureDevOpsClients;
use crate::error::{ApiError, MappingError};
use crate::models::{PolicyConfiguration, PolicyScope, PolicyTypeRef};
use crate::resource_data::{ResourceData, SETTINGS, parse_import_id};
use crate::schema::{Attribute, AttributeType, Schema, Validator};

pub use types::PolicyType;

pub const PROJECT_ID: &str = "project_id";
pub const ENABLED: &str = "enabled";
pub const BLOCKING: &str = "blocking";
pub const SCOPE: &str = "scope";

const MATCH_TYPE_EXACT: &str = "Exact";
const MATCH_TYPE_PREFIX: &str = "Prefix";
const MATCH_TYPE_DEFAULT_BRANCH: &str = "DefaultBranch";

/// Writes an API policy configuration into resource data.
pub type FlattenFunc =
    fn(&mut ResourceData, &PolicyConfiguration, &str) -> Result<(), MappingError>;

/// Builds an API policy configuration and its project id from resource data.
pub type ExpandFunc =
    fn(&ResourceData, Uuid) -> Result<(PolicyConfiguration, String), MappingError>;

/// What distinguishes one branch policy type from another.
#[derive(Clone, Copy)]
pub struct PolicyCrudArgs {
    pub flatten_func: FlattenFunc,
    pub expand_func: ExpandFunc,
    pub policy_type: PolicyType,
}

/// A branch policy resource built by [`gen_base_policy_resource`].
pub struct PolicyResource {
    type_name: &'static str,
    schema: Schema,
    args: PolicyCrudArgs,
}

impl PolicyResource {
    /// Adds policy type specific keys to the `settings` block.
    pub fn with_settings(mut self, extra: Schema) -> Self {
        if let Some(settings) = self.schema.block_schema_mut(SETTINGS) {
            settings.extend(extra);
        }
        self
    }

    pub fn policy_type(&self) -> PolicyType {
        self.args.policy_type
    }

    async fn read_into(
        &self,
        clients: &AzureDevOpsClients,
        d: &mut ResourceData,
        project_id: &str,
    ) -> Result<()> {
        let id = policy_id(d)?;
        let found = clients
            .policy()
            .get_policy_configuration(clients.organization(), project_id, id)
            .await
            .with_context(|| format!("Failed to read policy configuration {id}"))?;

        match found {
            Some(config) if config.is_deleted != Some(true) => {
                let expected = self.args.policy_type;
                if config.policy_type.id != expected.id() {
                    let found = PolicyType::from_id(config.policy_type.id)
                        .map_or("an unknown policy type", PolicyType::display_name);
                    return Err(MappingError::InvalidPayload {
                        model: "policy configuration",
                        message: format!(
                            "policy {id} is {found}, expected {}",
                            expected.display_name()
                        ),
                    }
                    .into());
                }
                (self.args.flatten_func)(d, &config, project_id)?;
            }
            _ => {
                debug!(id, project_id, "policy configuration is gone");
                d.clear_id();
            }
        }
        Ok(())
    }
}

/// Builds the resource for one policy type on top of the shared base schema.
pub fn gen_base_policy_resource(type_name: &'static str, args: PolicyCrudArgs) -> PolicyResource {
    PolicyResource {
        type_name,
        schema: base_schema(),
        args,
    }
}

fn base_schema() -> Schema {
    let scope = Schema::new()
        .with("repository_id", Attribute::optional(AttributeType::String))
        .with("repository_ref", Attribute::optional(AttributeType::String))
        .with(
            "match_type",
            Attribute::optional(AttributeType::String)
                .with_default(json!(MATCH_TYPE_EXACT))
                .validate(Validator::one_of_ignore_case(&[
                    MATCH_TYPE_EXACT,
                    MATCH_TYPE_PREFIX,
                    MATCH_TYPE_DEFAULT_BRANCH,
                ])),
        );

    let settings = Schema::new().with(
        SCOPE,
        Attribute::required(AttributeType::block(scope))
            .min_items(1)
            .describe("Repositories and refs the policy applies to"),
    );

    Schema::new()
        .with(
            PROJECT_ID,
            Attribute::required(AttributeType::String)
                .validate(Validator::IsUuid)
                .force_new(),
        )
        .with(
            ENABLED,
            Attribute::optional(AttributeType::Bool).with_default(json!(true)),
        )
        .with(
            BLOCKING,
            Attribute::optional(AttributeType::Bool).with_default(json!(true)),
        )
        .with(SETTINGS, Attribute::single_block(settings))
}

fn policy_id(d: &ResourceData) -> Result<i32, MappingError> {
    let id = d.id().unwrap_or_default();
    id.parse().map_err(|_| MappingError::InvalidId {
        id: id.to_string(),
        message: "policy configuration ids are integers".to_string(),
    })
}

/// Expands the attributes every policy type shares.
///
/// The returned settings hold only `scope`; policy types add their own keys.
pub fn base_expand(
    d: &ResourceData,
    type_id: Uuid,
) -> Result<(PolicyConfiguration, String), MappingError> {
    let project_id = d.require_str(PROJECT_ID)?.to_string();
    let id = match d.id() {
        Some(_) => Some(policy_id(d)?),
        None => None,
    };

    let scopes = d
        .settings()?
        .get(SCOPE)
        .and_then(Value::as_array)
        .map(|elements| elements.iter().map(expand_scope).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let mut settings = serde_json::Map::new();
    settings.insert(
        SCOPE.to_string(),
        serde_json::to_value(scopes).map_err(|e| MappingError::InvalidPayload {
            model: "policy scope",
            message: e.to_string(),
        })?,
    );

    let config = PolicyConfiguration {
        id,
        revision: None,
        is_enabled: d.get_bool(ENABLED).unwrap_or_default(),
        is_blocking: d.get_bool(BLOCKING).unwrap_or_default(),
        is_deleted: None,
        policy_type: PolicyTypeRef::new(type_id),
        settings,
        url: None,
    };
    Ok((config, project_id))
}

fn expand_scope(element: &Value) -> Result<PolicyScope, MappingError> {
    let scope = element
        .as_object()
        .ok_or_else(|| MappingError::InvalidAttribute {
            attribute: format!("{SETTINGS}.0.{SCOPE}"),
            message: "expected an object".to_string(),
        })?;
    let text = |key: &str| {
        scope
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let match_type = text("match_type");
    let default_branch = match_type
        .as_deref()
        .is_some_and(|m| m.eq_ignore_ascii_case(MATCH_TYPE_DEFAULT_BRANCH));

    Ok(PolicyScope {
        repository_id: text("repository_id"),
        ref_name: if default_branch {
            None
        } else {
            text("repository_ref")
        },
        match_kind: match_type,
    })
}

/// Flattens the attributes every policy type shares.
pub fn base_flatten(
    d: &mut ResourceData,
    config: &PolicyConfiguration,
    project_id: &str,
) -> Result<(), MappingError> {
    let id = config.id.ok_or_else(|| MappingError::InvalidPayload {
        model: "policy configuration",
        message: "missing id".to_string(),
    })?;

    d.set_id(id.to_string());
    d.set(PROJECT_ID, project_id);
    d.set(ENABLED, config.is_enabled);
    d.set(BLOCKING, config.is_blocking);

    let scopes: Vec<PolicyScope> = match config.settings.get(SCOPE) {
        Some(value) if !value.is_null() => {
            serde_json::from_value(value.clone()).map_err(|e| MappingError::InvalidPayload {
                model: "policy scope",
                message: e.to_string(),
            })?
        }
        _ => Vec::new(),
    };
    let flattened: Vec<Value> = scopes
        .into_iter()
        .map(|scope| {
            json!({
                "repository_id": scope.repository_id.unwrap_or_default(),
                "repository_ref": scope.ref_name.unwrap_or_default(),
                "match_type": scope.match_kind.unwrap_or_default(),
            })
        })
        .collect();

    d.settings_mut()?.insert(SCOPE.to_string(), Value::Array(flattened));
    Ok(())
}

#[async_trait]
impl Resource for PolicyResource {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    #[instrument(skip_all, fields(resource = self.type_name))]
    async fn create(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()> {
        let (config, project_id) = (self.args.expand_func)(d, self.args.policy_type.id())?;

        let created = clients
            .policy()
            .create_policy_configuration(clients.organization(), &project_id, config)
            .await
            .with_context(|| {
                format!(
                    "Failed to create {} policy in project {project_id}",
                    self.args.policy_type.display_name()
                )
            })?;

        (self.args.flatten_func)(d, &created, &project_id)?;
        info!(id = d.id(), %project_id, "policy configuration created");
        Ok(())
    }

    #[instrument(skip_all, fields(resource = self.type_name, id = d.id()))]
    async fn read(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()> {
        let project_id = d.require_str(PROJECT_ID)?.to_string();
        self.read_into(clients, d, &project_id).await
    }

    #[instrument(skip_all, fields(resource = self.type_name, id = d.id()))]
    async fn update(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()> {
        let (config, project_id) = (self.args.expand_func)(d, self.args.policy_type.id())?;
        let id = policy_id(d)?;

        let updated = clients
            .policy()
            .update_policy_configuration(clients.organization(), &project_id, id, config)
            .await
            .with_context(|| format!("Failed to update policy configuration {id}"))?;

        (self.args.flatten_func)(d, &updated, &project_id)?;
        info!(id, %project_id, "policy configuration updated");
        Ok(())
    }

    #[instrument(skip_all, fields(resource = self.type_name, id = d.id()))]
    async fn delete(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()> {
        let project_id = d.require_str(PROJECT_ID)?.to_string();
        let id = policy_id(d)?;

        clients
            .policy()
            .delete_policy_configuration(clients.organization(), &project_id, id)
            .await
            .with_context(|| format!("Failed to delete policy configuration {id}"))?;

        d.clear_id();
        info!(id, %project_id, "policy configuration deleted");
        Ok(())
    }

    #[instrument(skip_all, fields(resource = self.type_name, import_id = id))]
    async fn import(&self, clients: &AzureDevOpsClients, id: &str) -> Result<ResourceData> {
        let (project, policy) = parse_import_id(id)?;
        let project_id = clients.resolve_project_id(&project).await?;

        let mut d = ResourceData::new();
        d.set_id(policy);
        policy_id(&d)?;
        d.set(PROJECT_ID, project_id.as_str());

        self.read_into(clients, &mut d, &project_id).await?;
        if d.id().is_none() {
            return Err(ApiError::NotFound {
                resource: format!("policy configuration {id}"),
            }
            .into());
        }
        Ok(d)
    }
}
