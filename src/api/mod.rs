//! Azure DevOps API access.
//!
//! Resources talk to Azure DevOps through three operation traits so the same
//! lifecycle code runs against the service and against [`InMemoryBackend`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use azdo_provider::api::AzureDevOpsClients;
//! use secrecy::SecretString;
//!
//! # fn main() -> anyhow::Result<()> {
//! let pat = SecretString::from("my-pat".to_string());
//! let clients = AzureDevOpsClients::connect("https://dev.azure.com/my-org", &pat)?;
//! assert_eq!(clients.organization(), "my-org");
//! # Ok(())
//! # }
//! ```

mod client;
mod mappers;
mod memory;
mod traits;

pub use client::AzureDevOpsClients;
pub use mappers::organization_from_url;
pub use memory::InMemoryBackend;
pub use traits::{
    PolicyOperations, ProjectOperations, RealPolicyOperations, RealProjectOperations,
    RealServiceEndpointOperations, ServiceEndpointOperations,
};
