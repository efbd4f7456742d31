//! Connection to one Azure DevOps organization.

use anyhow::{Context, Result};
use azure_devops_rust_api::{core, policy, service_endpoint};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::mappers::organization_from_url;
use super::memory::InMemoryBackend;
use super::traits::{
    PolicyOperations, ProjectOperations, RealPolicyOperations, RealProjectOperations,
    RealServiceEndpointOperations, ServiceEndpointOperations,
};
use crate::error::ImportError;

/// The organization plus the operation handles the resources call.
///
/// # Example
///
/// ```rust
/// use azdo_provider::api::{AzureDevOpsClients, InMemoryBackend};
///
/// let clients = AzureDevOpsClients::in_memory("acme", InMemoryBackend::new());
/// assert_eq!(clients.organization(), "acme");
/// ```
#[derive(Clone)]
pub struct AzureDevOpsClients {
    organization: String,
    policy: Arc<dyn PolicyOperations>,
    service_endpoint: Arc<dyn ServiceEndpointOperations>,
    project: Arc<dyn ProjectOperations>,
}

impl AzureDevOpsClients {
    /// Builds clients from explicit operation handles.
    pub fn new(
        organization: impl Into<String>,
        policy: Arc<dyn PolicyOperations>,
        service_endpoint: Arc<dyn ServiceEndpointOperations>,
        project: Arc<dyn ProjectOperations>,
    ) -> Self {
        Self {
            organization: organization.into(),
            policy,
            service_endpoint,
            project,
        }
    }

    /// Connects to the organization behind `org_service_url` with a personal
    /// access token.
    ///
    /// The PAT stays wrapped in a SecretString until the SDK credential is built.
    pub fn connect(org_service_url: &str, pat: &SecretString) -> Result<Self> {
        let organization = organization_from_url(org_service_url)
            .context("Failed to parse organization service URL")?;
        let credential =
            azure_devops_rust_api::Credential::from_pat(pat.expose_secret().to_string());

        let policy = policy::ClientBuilder::new(credential.clone()).build();
        let service_endpoint = service_endpoint::ClientBuilder::new(credential.clone()).build();
        let core = core::ClientBuilder::new(credential).build();

        Ok(Self::new(
            organization,
            Arc::new(RealPolicyOperations::new(policy)),
            Arc::new(RealServiceEndpointOperations::new(service_endpoint)),
            Arc::new(RealProjectOperations::new(core)),
        ))
    }

    /// Wires every operation to the same in-memory backend.
    pub fn in_memory(organization: impl Into<String>, backend: InMemoryBackend) -> Self {
        let backend = Arc::new(backend);
        Self::new(organization, backend.clone(), backend.clone(), backend)
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn policy(&self) -> &dyn PolicyOperations {
        self.policy.as_ref()
    }

    pub fn service_endpoint(&self) -> &dyn ServiceEndpointOperations {
        self.service_endpoint.as_ref()
    }

    pub fn project(&self) -> &dyn ProjectOperations {
        self.project.as_ref()
    }

    /// Resolves a project name or id to the project id.
    pub async fn resolve_project_id(&self, project: &str) -> Result<String> {
        let found = self
            .project
            .get_project(&self.organization, project)
            .await
            .with_context(|| format!("Failed to look up project '{project}'"))?;

        match found {
            Some(p) => Ok(p.id),
            None => Err(ImportError::ProjectNotFound {
                project: project.to_string(),
            }
            .into()),
        }
    }
}
