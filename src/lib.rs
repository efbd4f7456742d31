//! # Azure DevOps Provider Library
//!
//! Declarative management of Azure DevOps branch policies and service
//! endpoints. This library provides:
//!
//! - Resource schemas with defaults and validation
//! - Flatten/expand mapping between configuration and the REST payloads
//! - The create, read, update, delete, import and apply lifecycle
//! - An in-memory backend for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use azdo_provider::{AzureDevOpsClients, Provider};
//! use secrecy::SecretString;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let pat = SecretString::from("my-pat".to_string());
//! let clients = AzureDevOpsClients::connect("https://dev.azure.com/my-org", &pat)?;
//! let provider = Provider::new(clients);
//!
//! let state = provider
//!     .import("azuredevops_serviceendpoint_azurecr", "my-project/0e8bd2b1-0c1e-4e0c-9f0e-63bd5f0a8a4c")
//!     .await?;
//! println!("imported {:?}", state.id());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod parsed_property;
pub mod provider;
pub mod resource_data;
pub mod resources;
pub mod schema;

// Re-export commonly used types for convenience
pub use api::{AzureDevOpsClients, InMemoryBackend};
pub use config::Config;
pub use models::Args;
pub use provider::{ApplyAction, ApplyOutcome, Provider};
pub use resource_data::ResourceData;

/// Core result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
