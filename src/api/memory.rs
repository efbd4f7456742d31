//! In-memory Azure DevOps backend for tests and offline runs.
//!
//! Behaves like the service where the resources can observe it: policy ids are
//! incrementing integers, deleted policies stay readable with `isDeleted`,
//! endpoint ids are UUIDs, and an endpoint disappears once the last project
//! referencing it has removed it.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::traits::{PolicyOperations, ProjectOperations, ServiceEndpointOperations};
use crate::error::ApiError;
use crate::models::{PolicyConfiguration, ServiceEndpoint, TeamProject};

const SERVICE_PRINCIPAL_ID: &str = "serviceprincipalid";
const WIF_ISSUER: &str = "workloadIdentityFederationIssuer";
const WIF_SUBJECT: &str = "workloadIdentityFederationSubject";

/// Thread-safe in-memory implementation of every operation trait.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<RwLock<InMemoryBackendInner>>,
}

#[derive(Debug, Default)]
struct InMemoryBackendInner {
    next_policy_id: i32,
    policies: BTreeMap<i32, StoredPolicy>,
    endpoints: HashMap<String, ServiceEndpoint>,
    projects: Vec<TeamProject>,
    deleted_endpoints: Vec<String>,
    pending_failure: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredPolicy {
    project: String,
    configuration: PolicyConfiguration,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a project and returns it.
    pub fn add_project(&self, name: &str) -> Result<TeamProject> {
        let project = TeamProject {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: None,
            state: Some("wellFormed".to_string()),
        };
        self.write()?.projects.push(project.clone());
        Ok(project)
    }

    /// Makes the next call on any trait fail with `message`.
    pub fn fail_next_call(&self, message: &str) -> Result<()> {
        self.write()?.pending_failure = Some(message.to_string());
        Ok(())
    }

    /// Policy as stored, including soft-deleted ones.
    pub fn policy(&self, id: i32) -> Option<PolicyConfiguration> {
        let inner = self.inner.read().ok()?;
        inner.policies.get(&id).map(|p| p.configuration.clone())
    }

    /// Endpoint as stored.
    pub fn endpoint(&self, id: &str) -> Option<ServiceEndpoint> {
        let inner = self.inner.read().ok()?;
        inner.endpoints.get(id).cloned()
    }

    /// Ids of endpoints removed from their last project.
    pub fn deleted_endpoints(&self) -> Vec<String> {
        self.inner
            .read()
            .map(|inner| inner.deleted_endpoints.clone())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, InMemoryBackendInner>, ApiError> {
        self.inner.read().map_err(|_| lock_error())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, InMemoryBackendInner>, ApiError> {
        self.inner.write().map_err(|_| lock_error())
    }

    /// Takes the write lock, failing instead when a failure was injected.
    fn begin(&self) -> Result<RwLockWriteGuard<'_, InMemoryBackendInner>, ApiError> {
        let mut inner = self.write()?;
        if let Some(message) = inner.pending_failure.take() {
            return Err(ApiError::Backend { message });
        }
        Ok(inner)
    }
}

fn lock_error() -> ApiError {
    ApiError::Backend {
        message: "in-memory backend lock poisoned".to_string(),
    }
}

fn not_found(resource: String) -> ApiError {
    ApiError::NotFound { resource }
}

#[async_trait]
impl PolicyOperations for InMemoryBackend {
    async fn create_policy_configuration(
        &self,
        _organization: &str,
        project: &str,
        mut configuration: PolicyConfiguration,
    ) -> Result<PolicyConfiguration> {
        let mut inner = self.begin()?;
        inner.next_policy_id += 1;
        let id = inner.next_policy_id;

        configuration.id = Some(id);
        configuration.revision = Some(1);
        configuration.is_deleted = Some(false);
        configuration.url = Some(format!(
            "https://dev.azure.com/_apis/{project}/policy/configurations/{id}"
        ));

        inner.policies.insert(
            id,
            StoredPolicy {
                project: project.to_string(),
                configuration: configuration.clone(),
            },
        );
        Ok(configuration)
    }

    async fn get_policy_configuration(
        &self,
        _organization: &str,
        project: &str,
        configuration_id: i32,
    ) -> Result<Option<PolicyConfiguration>> {
        let inner = self.begin()?;
        Ok(inner
            .policies
            .get(&configuration_id)
            .filter(|p| p.project == project)
            .map(|p| p.configuration.clone()))
    }

    async fn update_policy_configuration(
        &self,
        _organization: &str,
        project: &str,
        configuration_id: i32,
        mut configuration: PolicyConfiguration,
    ) -> Result<PolicyConfiguration> {
        let mut inner = self.begin()?;
        let stored = inner
            .policies
            .get_mut(&configuration_id)
            .filter(|p| p.project == project && p.configuration.is_deleted != Some(true))
            .ok_or_else(|| not_found(format!("policy configuration {configuration_id}")))?;

        configuration.id = Some(configuration_id);
        configuration.revision = stored.configuration.revision.map(|r| r + 1);
        configuration.is_deleted = Some(false);
        configuration.url = stored.configuration.url.clone();
        stored.configuration = configuration.clone();
        Ok(configuration)
    }

    async fn delete_policy_configuration(
        &self,
        _organization: &str,
        project: &str,
        configuration_id: i32,
    ) -> Result<()> {
        let mut inner = self.begin()?;
        let stored = inner
            .policies
            .get_mut(&configuration_id)
            .filter(|p| p.project == project)
            .ok_or_else(|| not_found(format!("policy configuration {configuration_id}")))?;
        stored.configuration.is_deleted = Some(true);
        Ok(())
    }
}

#[async_trait]
impl ServiceEndpointOperations for InMemoryBackend {
    async fn create_service_endpoint(
        &self,
        organization: &str,
        mut endpoint: ServiceEndpoint,
    ) -> Result<ServiceEndpoint> {
        let mut inner = self.begin()?;
        let id = Uuid::new_v4().to_string();

        endpoint.id = Some(id.clone());
        endpoint.is_ready = Some(true);
        fill_server_parameters(organization, &mut endpoint, None);

        inner.endpoints.insert(id, endpoint.clone());
        Ok(endpoint)
    }

    async fn get_service_endpoint(
        &self,
        _organization: &str,
        project: &str,
        endpoint_id: &str,
    ) -> Result<Option<ServiceEndpoint>> {
        let inner = self.begin()?;
        Ok(inner
            .endpoints
            .get(endpoint_id)
            .filter(|e| {
                e.service_endpoint_project_references
                    .iter()
                    .any(|r| r.project_reference.id == project)
            })
            .cloned())
    }

    async fn update_service_endpoint(
        &self,
        organization: &str,
        endpoint_id: &str,
        mut endpoint: ServiceEndpoint,
    ) -> Result<ServiceEndpoint> {
        let mut inner = self.begin()?;
        let existing = inner
            .endpoints
            .get_mut(endpoint_id)
            .ok_or_else(|| not_found(format!("service endpoint {endpoint_id}")))?;

        endpoint.id = Some(endpoint_id.to_string());
        endpoint.is_ready = Some(true);
        fill_server_parameters(organization, &mut endpoint, Some(&*existing));
        *existing = endpoint.clone();
        Ok(endpoint)
    }

    async fn delete_service_endpoint(
        &self,
        _organization: &str,
        project_ids: &[String],
        endpoint_id: &str,
    ) -> Result<()> {
        let mut inner = self.begin()?;
        let endpoint = inner
            .endpoints
            .get_mut(endpoint_id)
            .ok_or_else(|| not_found(format!("service endpoint {endpoint_id}")))?;

        endpoint
            .service_endpoint_project_references
            .retain(|r| !project_ids.contains(&r.project_reference.id));

        if endpoint.service_endpoint_project_references.is_empty() {
            inner.endpoints.remove(endpoint_id);
            inner.deleted_endpoints.push(endpoint_id.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectOperations for InMemoryBackend {
    async fn get_project(&self, _organization: &str, project: &str) -> Result<Option<TeamProject>> {
        let inner = self.read()?;
        Ok(inner
            .projects
            .iter()
            .find(|p| p.id == project || p.name.eq_ignore_ascii_case(project))
            .cloned())
    }
}

/// Fills the authorization parameters the service generates for Azure RM
/// style endpoints, keeping values generated earlier for the same endpoint.
fn fill_server_parameters(
    organization: &str,
    endpoint: &mut ServiceEndpoint,
    existing: Option<&ServiceEndpoint>,
) {
    let previous = existing
        .and_then(|e| e.authorization.as_ref())
        .map(|a| a.parameters.clone())
        .unwrap_or_default();
    let project = endpoint
        .service_endpoint_project_references
        .first()
        .map(|r| r.project_reference.id.clone())
        .unwrap_or_default();
    let name = endpoint.name.clone().unwrap_or_default();

    let Some(authorization) = endpoint.authorization.as_mut() else {
        return;
    };
    let parameters = &mut authorization.parameters;

    match authorization.scheme.as_str() {
        "ServicePrincipal" | "WorkloadIdentityFederation" => {
            let generated = previous
                .get(SERVICE_PRINCIPAL_ID)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let slot = parameters.entry(SERVICE_PRINCIPAL_ID.to_string()).or_default();
            if slot.is_empty() {
                *slot = generated;
            }
        }
        _ => {}
    }

    if authorization.scheme == "WorkloadIdentityFederation" {
        parameters.insert(
            WIF_ISSUER.to_string(),
            format!("https://vstoken.dev.azure.com/{organization}"),
        );
        parameters.insert(
            WIF_SUBJECT.to_string(),
            format!("sc://{organization}/{project}/{name}"),
        );
    }
}
