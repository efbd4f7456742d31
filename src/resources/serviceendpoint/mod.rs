//! Service endpoint (service connection) resources.
//!
//! Mirrors the branch policy wrapper: endpoint kinds contribute their schema
//! and flatten/expand functions, the lifecycle is shared.

pub mod azurecr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use super::Resource;
use crate::api::AzureDevOpsClients;
use crate::error::{ApiError, MappingError};
use crate::models::{ProjectReference, ServiceEndpoint, ServiceEndpointProjectReference};
use crate::resource_data::{ResourceData, parse_import_id};
use crate::schema::{Attribute, AttributeType, Schema, Validator};

pub const PROJECT_ID: &str = "project_id";
pub const SERVICE_ENDPOINT_NAME: &str = "service_endpoint_name";
pub const DESCRIPTION: &str = "description";
pub const AUTHORIZATION: &str = "authorization";

const DEFAULT_DESCRIPTION: &str = "Managed by Terraform";
const OWNER_LIBRARY: &str = "library";

pub type FlattenFunc = fn(&mut ResourceData, &ServiceEndpoint, &str) -> Result<(), MappingError>;

pub type ExpandFunc = fn(&ResourceData) -> Result<(ServiceEndpoint, String), MappingError>;

#[derive(Clone, Copy)]
pub struct ServiceEndpointCrudArgs {
    pub flatten_func: FlattenFunc,
    pub expand_func: ExpandFunc,
}

/// A service endpoint resource built by [`gen_base_service_endpoint_resource`].
pub struct ServiceEndpointResource {
    type_name: &'static str,
    schema: Schema,
    args: ServiceEndpointCrudArgs,
}

impl ServiceEndpointResource {
    /// Adds endpoint kind specific attributes.
    pub fn with_attributes(mut self, extra: Schema) -> Self {
        self.schema.extend(extra);
        self
    }

    async fn read_into(
        &self,
        clients: &AzureDevOpsClients,
        d: &mut ResourceData,
        project_id: &str,
    ) -> Result<()> {
        let id = d.id().unwrap_or_default().to_string();
        let found = clients
            .service_endpoint()
            .get_service_endpoint(clients.organization(), project_id, &id)
            .await
            .with_context(|| format!("Failed to read service endpoint {id}"))?;

        match found {
            Some(endpoint) if endpoint.id.is_some() => {
                (self.args.flatten_func)(d, &endpoint, project_id)?;
            }
            _ => {
                debug!(%id, project_id, "service endpoint is gone");
                d.clear_id();
            }
        }
        Ok(())
    }
}

pub fn gen_base_service_endpoint_resource(
    type_name: &'static str,
    args: ServiceEndpointCrudArgs,
) -> ServiceEndpointResource {
    ServiceEndpointResource {
        type_name,
        schema: base_schema(),
        args,
    }
}

fn base_schema() -> Schema {
    Schema::new()
        .with(
            PROJECT_ID,
            Attribute::required(AttributeType::String)
                .validate(Validator::StringIsNotEmpty)
                .force_new(),
        )
        .with(
            SERVICE_ENDPOINT_NAME,
            Attribute::required(AttributeType::String).validate(Validator::StringIsNotEmpty),
        )
        .with(
            DESCRIPTION,
            Attribute::optional(AttributeType::String).with_default(json!(DEFAULT_DESCRIPTION)),
        )
        .with(
            AUTHORIZATION,
            Attribute::computed(AttributeType::Map).sensitive(),
        )
}

/// Expands the attributes every endpoint kind shares; kinds fill in type,
/// url, authorization and data.
pub fn base_expand(d: &ResourceData) -> Result<(ServiceEndpoint, String), MappingError> {
    let project_id = d.require_str(PROJECT_ID)?.to_string();
    let name = d.require_str(SERVICE_ENDPOINT_NAME)?.to_string();
    let description = d.get_str(DESCRIPTION).unwrap_or_default().to_string();

    let endpoint = ServiceEndpoint {
        id: d.id().map(str::to_string),
        name: Some(name.clone()),
        owner: Some(OWNER_LIBRARY.to_string()),
        description: Some(description.clone()),
        service_endpoint_project_references: vec![ServiceEndpointProjectReference {
            project_reference: ProjectReference {
                id: project_id.clone(),
                name: None,
            },
            name,
            description: Some(description),
        }],
        ..Default::default()
    };
    Ok((endpoint, project_id))
}

/// Flattens the attributes every endpoint kind shares.
pub fn base_flatten(
    d: &mut ResourceData,
    endpoint: &ServiceEndpoint,
    project_id: &str,
) -> Result<(), MappingError> {
    let id = endpoint
        .id
        .as_deref()
        .ok_or_else(|| MappingError::InvalidPayload {
            model: "service endpoint",
            message: "missing id".to_string(),
        })?;

    d.set_id(id);
    d.set(PROJECT_ID, project_id);
    d.set(
        SERVICE_ENDPOINT_NAME,
        endpoint.name.clone().unwrap_or_default(),
    );
    d.set(DESCRIPTION, endpoint.description.clone().unwrap_or_default());

    let mut authorization = BTreeMap::new();
    if let Some(auth) = &endpoint.authorization {
        authorization.insert("scheme".to_string(), auth.scheme.clone());
    }
    d.set(AUTHORIZATION, json!(authorization));
    Ok(())
}

#[async_trait]
impl Resource for ServiceEndpointResource {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    #[instrument(skip_all, fields(resource = self.type_name))]
    async fn create(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()> {
        let (endpoint, project_id) = (self.args.expand_func)(d)?;
        let name = endpoint.name.clone().unwrap_or_default();

        let created = clients
            .service_endpoint()
            .create_service_endpoint(clients.organization(), endpoint)
            .await
            .with_context(|| format!("Failed to create service endpoint '{name}'"))?;
        if created.id.is_none() {
            return Err(ApiError::MissingId {
                entity: "service endpoint",
            }
            .into());
        }

        (self.args.flatten_func)(d, &created, &project_id)?;
        info!(id = d.id(), %project_id, %name, "service endpoint created");
        Ok(())
    }

    #[instrument(skip_all, fields(resource = self.type_name, id = d.id()))]
    async fn read(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()> {
        let project_id = d.require_str(PROJECT_ID)?.to_string();
        self.read_into(clients, d, &project_id).await
    }

    #[instrument(skip_all, fields(resource = self.type_name, id = d.id()))]
    async fn update(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()> {
        let (endpoint, project_id) = (self.args.expand_func)(d)?;
        let id = d.id().unwrap_or_default().to_string();

        let updated = clients
            .service_endpoint()
            .update_service_endpoint(clients.organization(), &id, endpoint)
            .await
            .with_context(|| format!("Failed to update service endpoint {id}"))?;

        (self.args.flatten_func)(d, &updated, &project_id)?;
        info!(%id, %project_id, "service endpoint updated");
        Ok(())
    }

    #[instrument(skip_all, fields(resource = self.type_name, id = d.id()))]
    async fn delete(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()> {
        let project_id = d.require_str(PROJECT_ID)?.to_string();
        let id = d.id().unwrap_or_default().to_string();

        clients
            .service_endpoint()
            .delete_service_endpoint(clients.organization(), &[project_id.clone()], &id)
            .await
            .with_context(|| format!("Failed to delete service endpoint {id}"))?;

        d.clear_id();
        info!(%id, %project_id, "service endpoint deleted");
        Ok(())
    }

    #[instrument(skip_all, fields(resource = self.type_name, import_id = id))]
    async fn import(&self, clients: &AzureDevOpsClients, id: &str) -> Result<ResourceData> {
        let (project, endpoint_id) = parse_import_id(id)?;
        let project_id = clients.resolve_project_id(&project).await?;

        let mut d = ResourceData::new();
        d.set_id(endpoint_id);
        d.set(PROJECT_ID, project_id.as_str());

        self.read_into(clients, &mut d, &project_id).await?;
        if d.id().is_none() {
            return Err(ApiError::NotFound {
                resource: format!("service endpoint {id}"),
            }
            .into());
        }
        Ok(d)
    }
}
