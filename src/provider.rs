//! The provider: a registry of resource types plus the lifecycle the host
//! drives them through.
//!
//! Every entry point takes the resource type name, checks configuration
//! against the resource schema before any request is sent, and reports
//! failures as [`ProviderError`] so callers can tell a bad configuration from
//! a failed request.
//!
//! ## Example
//!
//! ```rust
//! use azdo_provider::api::{AzureDevOpsClients, InMemoryBackend};
//! use azdo_provider::provider::{ApplyAction, Provider};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let backend = InMemoryBackend::new();
//! let project = backend.add_project("Fabrikam")?;
//! let provider = Provider::new(AzureDevOpsClients::in_memory("acme", backend));
//!
//! let config = json!({
//!     "project_id": project.id,
//!     "settings": [{ "name": "ci/lint", "scope": [{ "repository_id": "repo" }] }]
//! });
//! let outcome = provider
//!     .apply(
//!         "azuredevops_branch_policy_status_check",
//!         None,
//!         config.as_object().cloned().unwrap_or_default(),
//!     )
//!     .await?;
//! assert_eq!(outcome.action, ApplyAction::Created);
//! # Ok(())
//! # }
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument};

use crate::api::AzureDevOpsClients;
use crate::error::{
    ApiError, ConfigError, ImportError, MappingError, ProviderError, ProviderResult, SchemaError,
};
use crate::resource_data::ResourceData;
use crate::resources::{self, Resource};
use crate::schema::{Presence, Schema};

/// What [`Provider::apply`] did to reach the configured state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Created,
    Updated,
    /// A `force_new` attribute changed: deleted, then created.
    Replaced,
    Unchanged,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Replaced => "replaced",
            Self::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub action: ApplyAction,
    pub state: ResourceData,
}

pub struct Provider {
    clients: Option<AzureDevOpsClients>,
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
}

impl Provider {
    pub fn new(clients: AzureDevOpsClients) -> Self {
        Self {
            clients: Some(clients),
            ..Self::offline()
        }
    }

    /// A provider without a connection; only [`schema`](Self::schema) and
    /// [`validate`](Self::validate) work.
    pub fn offline() -> Self {
        Self {
            clients: None,
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
        }
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    fn resource(&self, type_name: &str) -> ProviderResult<&dyn Resource> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn clients(&self) -> ProviderResult<&AzureDevOpsClients> {
        self.clients.as_ref().ok_or_else(|| {
            ConfigError::MissingRequired {
                field: "organization service URL".to_string(),
                flag: "org-service-url".to_string(),
                env_var: crate::config::ENV_ORG_SERVICE_URL.to_string(),
            }
            .into()
        })
    }

    pub fn schema(&self, type_name: &str) -> ProviderResult<&Schema> {
        Ok(self.resource(type_name)?.schema())
    }

    /// Fills defaults into `config` and checks it against the schema.
    pub fn validate(
        &self,
        type_name: &str,
        mut config: Map<String, Value>,
    ) -> ProviderResult<ResourceData> {
        let schema = self.schema(type_name)?;
        schema.apply_defaults(&mut config);
        schema.validate(&config)?;
        Ok(ResourceData::from_attributes(config))
    }

    #[instrument(skip(self, config))]
    pub async fn create(
        &self,
        type_name: &str,
        config: Map<String, Value>,
    ) -> ProviderResult<ResourceData> {
        let resource = self.resource(type_name)?;
        let mut d = self.validate(type_name, config)?;
        resource
            .create(self.clients()?, &mut d)
            .await
            .map_err(classify)?;
        Ok(d)
    }

    /// Refreshes `state`. The returned data has no id when the entity is gone.
    #[instrument(skip_all, fields(type_name = %type_name, id = state.id()))]
    pub async fn read(
        &self,
        type_name: &str,
        mut state: ResourceData,
    ) -> ProviderResult<ResourceData> {
        let resource = self.resource(type_name)?;
        if state.id().is_none() {
            return Ok(state);
        }
        resource
            .read(self.clients()?, &mut state)
            .await
            .map_err(classify)?;
        Ok(state)
    }

    /// Updates the entity recorded in `prior` to match `config` in place.
    #[instrument(skip_all, fields(type_name = %type_name, id = prior.id()))]
    pub async fn update(
        &self,
        type_name: &str,
        prior: &ResourceData,
        config: Map<String, Value>,
    ) -> ProviderResult<ResourceData> {
        let resource = self.resource(type_name)?;
        let mut d = self.validate(type_name, config)?;
        let id = prior.id().ok_or_else(|| ApiError::NotFound {
            resource: format!("{type_name} without id"),
        })?;
        d.set_id(id);
        carry_computed(resource.schema(), prior, &mut d);

        resource
            .update(self.clients()?, &mut d)
            .await
            .map_err(classify)?;
        Ok(d)
    }

    #[instrument(skip_all, fields(type_name = %type_name, id = state.id()))]
    pub async fn delete(&self, type_name: &str, mut state: ResourceData) -> ProviderResult<()> {
        let resource = self.resource(type_name)?;
        if state.id().is_none() {
            debug!("nothing to delete");
            return Ok(());
        }
        resource
            .delete(self.clients()?, &mut state)
            .await
            .map_err(classify)
    }

    #[instrument(skip(self))]
    pub async fn import(&self, type_name: &str, id: &str) -> ProviderResult<ResourceData> {
        let resource = self.resource(type_name)?;
        resource
            .import(self.clients()?, id)
            .await
            .map_err(classify)
    }

    /// Brings the entity in line with `config`.
    ///
    /// Without prior state, or when the prior entity is gone, the entity is
    /// created. Otherwise the prior state is refreshed and compared: equal
    /// configured attributes leave it alone, a changed `force_new` attribute
    /// replaces it, anything else is updated in place.
    #[instrument(skip(self, prior, config))]
    pub async fn apply(
        &self,
        type_name: &str,
        prior: Option<ResourceData>,
        config: Map<String, Value>,
    ) -> ProviderResult<ApplyOutcome> {
        let resource = self.resource(type_name)?;
        let desired = self.validate(type_name, config)?;

        let current = match prior {
            Some(prior) => self.read(type_name, prior).await?,
            None => ResourceData::new(),
        };
        if current.id().is_none() {
            let state = self.create(type_name, desired.attributes().clone()).await?;
            info!(id = state.id(), "applied: created");
            return Ok(ApplyOutcome {
                action: ApplyAction::Created,
                state,
            });
        }

        let changed = changed_attributes(resource.schema(), &current, &desired);
        if changed.is_empty() {
            info!(id = current.id(), "applied: unchanged");
            return Ok(ApplyOutcome {
                action: ApplyAction::Unchanged,
                state: current,
            });
        }
        debug!(?changed, "configuration differs from state");

        let replace = changed
            .iter()
            .any(|name| resource.schema().attribute(name).is_some_and(|a| a.force_new));

        if replace {
            self.delete(type_name, current).await?;
            let state = self.create(type_name, desired.attributes().clone()).await?;
            info!(id = state.id(), "applied: replaced");
            Ok(ApplyOutcome {
                action: ApplyAction::Replaced,
                state,
            })
        } else {
            let state = self
                .update(type_name, &current, desired.attributes().clone())
                .await?;
            info!(id = state.id(), "applied: updated");
            Ok(ApplyOutcome {
                action: ApplyAction::Updated,
                state,
            })
        }
    }
}

/// Configurable attributes whose desired value differs from the current one.
fn changed_attributes(
    schema: &Schema,
    current: &ResourceData,
    desired: &ResourceData,
) -> Vec<String> {
    schema
        .attributes()
        .filter(|(_, a)| a.presence != Presence::Computed)
        .filter(|(name, _)| current.get(name) != desired.get(name))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Computed attributes are never configured; keep what the service reported.
fn carry_computed(schema: &Schema, prior: &ResourceData, d: &mut ResourceData) {
    for (name, attribute) in schema.attributes() {
        if attribute.presence == Presence::Computed
            && let Some(value) = prior.get(name)
        {
            d.set(name, value.clone());
        }
    }
}

/// Recovers the typed error behind a lifecycle failure.
///
/// Errors that picked up context on the way stay [`ProviderError::Other`] so
/// the context is not lost.
fn classify(err: anyhow::Error) -> ProviderError {
    if err.chain().nth(1).is_some() {
        return ProviderError::Other(err);
    }
    let err = match err.downcast::<SchemaError>() {
        Ok(e) => return e.into(),
        Err(err) => err,
    };
    let err = match err.downcast::<MappingError>() {
        Ok(e) => return e.into(),
        Err(err) => err,
    };
    let err = match err.downcast::<ImportError>() {
        Ok(e) => return e.into(),
        Err(err) => err,
    };
    let err = match err.downcast::<ApiError>() {
        Ok(e) => return e.into(),
        Err(err) => err,
    };
    match err.downcast::<ConfigError>() {
        Ok(e) => e.into(),
        Err(err) => ProviderError::Other(err),
    }
}
