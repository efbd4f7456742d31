//! Managed resource types.
//!
//! Every resource implements [`Resource`]: a schema plus the create, read,
//! update, delete and import lifecycle. Lifecycle methods receive the
//! resource data already defaulted and validated, and leave it holding the
//! state as reported by the service.

pub mod policy;
pub mod serviceendpoint;

use anyhow::Result;
use async_trait::async_trait;

use crate::api::AzureDevOpsClients;
use crate::resource_data::ResourceData;
use crate::schema::Schema;

/// A resource type the provider manages.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name used in resource files, e.g. `azuredevops_branch_policy_status_check`.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> &Schema;

    /// Creates the entity and records its id and state in `d`.
    async fn create(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()>;

    /// Refreshes `d` from the service. Clears the id when the entity is gone.
    async fn read(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()>;

    async fn update(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()>;

    /// Deletes the entity and clears the id.
    async fn delete(&self, clients: &AzureDevOpsClients, d: &mut ResourceData) -> Result<()>;

    /// Adopts an existing entity given as `<project id or name>/<resource id>`.
    async fn import(&self, clients: &AzureDevOpsClients, id: &str) -> Result<ResourceData>;
}

/// Every resource type the provider ships.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(policy::status_check::resource()),
        Box::new(serviceendpoint::azurecr::resource()),
    ]
}
