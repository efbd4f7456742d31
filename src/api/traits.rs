//! Traits for Azure DevOps API operations.
//!
//! These traits abstract the Azure DevOps API operations the resources need so
//! the lifecycle code can run against the real service or the in-memory
//! backend used by tests and offline runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_devops_rust_api::core::models as core_models;
use azure_devops_rust_api::policy::models as policy_models;
use azure_devops_rust_api::service_endpoint::models as endpoint_models;

use super::mappers::{from_sdk, is_not_found, to_sdk};
use crate::models::{PolicyConfiguration, ServiceEndpoint, TeamProject};

/// Trait for branch policy configuration operations.
#[async_trait]
pub trait PolicyOperations: Send + Sync {
    /// Creates a policy configuration in a project.
    async fn create_policy_configuration(
        &self,
        organization: &str,
        project: &str,
        configuration: PolicyConfiguration,
    ) -> Result<PolicyConfiguration>;

    /// Fetches a policy configuration; `None` when the service answers 404.
    async fn get_policy_configuration(
        &self,
        organization: &str,
        project: &str,
        configuration_id: i32,
    ) -> Result<Option<PolicyConfiguration>>;

    /// Replaces a policy configuration.
    async fn update_policy_configuration(
        &self,
        organization: &str,
        project: &str,
        configuration_id: i32,
        configuration: PolicyConfiguration,
    ) -> Result<PolicyConfiguration>;

    /// Deletes a policy configuration.
    async fn delete_policy_configuration(
        &self,
        organization: &str,
        project: &str,
        configuration_id: i32,
    ) -> Result<()>;
}

/// Trait for service endpoint operations.
#[async_trait]
pub trait ServiceEndpointOperations: Send + Sync {
    async fn create_service_endpoint(
        &self,
        organization: &str,
        endpoint: ServiceEndpoint,
    ) -> Result<ServiceEndpoint>;

    /// Fetches an endpoint as seen from a project; `None` when it does not exist there.
    async fn get_service_endpoint(
        &self,
        organization: &str,
        project: &str,
        endpoint_id: &str,
    ) -> Result<Option<ServiceEndpoint>>;

    async fn update_service_endpoint(
        &self,
        organization: &str,
        endpoint_id: &str,
        endpoint: ServiceEndpoint,
    ) -> Result<ServiceEndpoint>;

    /// Removes the endpoint from the given projects; the service deletes it
    /// once no project references it.
    async fn delete_service_endpoint(
        &self,
        organization: &str,
        project_ids: &[String],
        endpoint_id: &str,
    ) -> Result<()>;
}

/// Trait for project lookups.
#[async_trait]
pub trait ProjectOperations: Send + Sync {
    /// Looks a project up by id or name.
    async fn get_project(&self, organization: &str, project: &str) -> Result<Option<TeamProject>>;
}

/// Real implementation wrapping azure_devops_rust_api::policy::Client.
#[derive(Clone)]
pub struct RealPolicyOperations {
    client: azure_devops_rust_api::policy::Client,
}

impl RealPolicyOperations {
    pub fn new(client: azure_devops_rust_api::policy::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PolicyOperations for RealPolicyOperations {
    async fn create_policy_configuration(
        &self,
        organization: &str,
        project: &str,
        configuration: PolicyConfiguration,
    ) -> Result<PolicyConfiguration> {
        let body: policy_models::PolicyConfiguration =
            to_sdk("policy configuration", &configuration)?;
        let created = self
            .client
            .configurations_client()
            .create(organization, body, project)
            .await?;
        Ok(from_sdk("policy configuration", &created)?)
    }

    async fn get_policy_configuration(
        &self,
        organization: &str,
        project: &str,
        configuration_id: i32,
    ) -> Result<Option<PolicyConfiguration>> {
        let result = self
            .client
            .configurations_client()
            .get(organization, project, configuration_id)
            .await;
        match result {
            Ok(configuration) => Ok(Some(from_sdk("policy configuration", &configuration)?)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_policy_configuration(
        &self,
        organization: &str,
        project: &str,
        configuration_id: i32,
        configuration: PolicyConfiguration,
    ) -> Result<PolicyConfiguration> {
        let body: policy_models::PolicyConfiguration =
            to_sdk("policy configuration", &configuration)?;
        let updated = self
            .client
            .configurations_client()
            .update(organization, body, project, configuration_id)
            .await?;
        Ok(from_sdk("policy configuration", &updated)?)
    }

    async fn delete_policy_configuration(
        &self,
        organization: &str,
        project: &str,
        configuration_id: i32,
    ) -> Result<()> {
        self.client
            .configurations_client()
            .delete(organization, project, configuration_id)
            .await?;
        Ok(())
    }
}

/// Real implementation wrapping azure_devops_rust_api::service_endpoint::Client.
#[derive(Clone)]
pub struct RealServiceEndpointOperations {
    client: azure_devops_rust_api::service_endpoint::Client,
}

impl RealServiceEndpointOperations {
    pub fn new(client: azure_devops_rust_api::service_endpoint::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServiceEndpointOperations for RealServiceEndpointOperations {
    async fn create_service_endpoint(
        &self,
        organization: &str,
        endpoint: ServiceEndpoint,
    ) -> Result<ServiceEndpoint> {
        let body: endpoint_models::ServiceEndpoint = to_sdk("service endpoint", &endpoint)?;
        let created = self
            .client
            .endpoints_client()
            .create(organization, body)
            .await?;
        Ok(from_sdk("service endpoint", &created)?)
    }

    async fn get_service_endpoint(
        &self,
        organization: &str,
        project: &str,
        endpoint_id: &str,
    ) -> Result<Option<ServiceEndpoint>> {
        let result = self
            .client
            .endpoints_client()
            .get(organization, project, endpoint_id)
            .await;
        match result {
            Ok(endpoint) => {
                let endpoint: ServiceEndpoint = from_sdk("service endpoint", &endpoint)?;
                // A deleted endpoint comes back as an empty document.
                Ok(endpoint.id.is_some().then_some(endpoint))
            }
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_service_endpoint(
        &self,
        organization: &str,
        endpoint_id: &str,
        endpoint: ServiceEndpoint,
    ) -> Result<ServiceEndpoint> {
        let body: endpoint_models::ServiceEndpoint = to_sdk("service endpoint", &endpoint)?;
        let updated = self
            .client
            .endpoints_client()
            .update_service_endpoint(organization, body, endpoint_id)
            .await?;
        Ok(from_sdk("service endpoint", &updated)?)
    }

    async fn delete_service_endpoint(
        &self,
        organization: &str,
        project_ids: &[String],
        endpoint_id: &str,
    ) -> Result<()> {
        self.client
            .endpoints_client()
            .delete(organization, endpoint_id, project_ids.join(","))
            .await?;
        Ok(())
    }
}

/// Real implementation wrapping azure_devops_rust_api::core::Client.
#[derive(Clone)]
pub struct RealProjectOperations {
    client: azure_devops_rust_api::core::Client,
}

impl RealProjectOperations {
    pub fn new(client: azure_devops_rust_api::core::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProjectOperations for RealProjectOperations {
    async fn get_project(&self, organization: &str, project: &str) -> Result<Option<TeamProject>> {
        let result = self
            .client
            .projects_client()
            .get(organization, project)
            .await;
        match result {
            Ok(project) => {
                let project: core_models::TeamProject = project;
                Ok(Some(
                    from_sdk("team project", &project).context("Failed to read project")?,
                ))
            }
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
