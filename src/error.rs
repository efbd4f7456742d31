//! Unified error handling for the azdo-provider library.
//!
//! This module provides the error hierarchy using `thiserror` so callers can
//! match on what went wrong instead of parsing messages.
//!
//! ## Error Categories
//!
//! - [`ApiError`]: Errors from Azure DevOps API interactions
//! - [`ConfigError`]: Errors from provider configuration loading and validation
//! - [`SchemaError`]: Resource configuration rejected by its schema
//! - [`MappingError`]: An API payload or configuration could not be mapped
//! - [`ImportError`]: Malformed import identifiers
//!
//! ## Example
//!
//! ```rust,no_run
//! use azdo_provider::error::{ProviderError, ImportError};
//!
//! fn example() -> Result<(), ProviderError> {
//!     Err(ImportError::InvalidFormat { id: "abc".to_string() })?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// An error occurred while interacting with the Azure DevOps API.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// An error occurred while loading or validating provider configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The resource configuration does not satisfy its schema.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Translating between configuration and API representation failed.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// The import identifier could not be parsed.
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// No resource is registered under the requested type name.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A generic error for cases not covered by specific error types.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Errors that can occur when interacting with the Azure DevOps API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The organization URL does not name an Azure DevOps organization.
    #[error("Cannot determine organization from URL '{url}'")]
    InvalidOrganizationUrl {
        /// The URL that was provided.
        url: String,
    },

    /// The requested resource was not found (404).
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Description of the resource that was not found.
        resource: String,
    },

    /// The service answered without an identifier for an entity it just stored.
    #[error("{entity} returned by the service has no id")]
    MissingId {
        /// Kind of entity, e.g. "policy configuration".
        entity: &'static str,
    },

    /// The backend rejected the request or could not serve it.
    #[error("Request failed: {message}")]
    Backend {
        /// Reason reported by the backend.
        message: String,
    },

    /// Converting between SDK models and wire models failed.
    #[error("Failed to convert {model}: {message}")]
    Conversion {
        /// Name of the model being converted.
        model: &'static str,
        /// Underlying serde message.
        message: String,
    },
}

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required configuration field is missing.
    #[error("{field} is required (use --{flag}, {env_var} env var, or config file)")]
    MissingRequired {
        /// Name of the missing field.
        field: String,
        /// Command line flag for this field.
        flag: String,
        /// Environment variable name for this field.
        env_var: String,
    },

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file at {path}: {message}")]
    ParseError {
        /// Path to the config file.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// An invalid value was provided for a configuration field.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Name of the field with invalid value.
        field: String,
        /// Description of why the value is invalid.
        message: String,
    },

    /// The home directory could not be determined.
    #[error("Could not determine home directory")]
    NoHomeDirectory,
}

/// A single problem found while checking a configuration against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Dotted attribute path, e.g. `settings.0.applicability`.
    pub path: String,
    /// What is wrong with the value.
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every diagnostic produced while validating one resource configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .diagnostics
            .iter()
            .map(Diagnostic::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(
            f,
            "{} invalid attribute(s): {}",
            self.diagnostics.len(),
            joined
        )
    }
}

/// Errors raised while flattening or expanding a resource.
#[derive(Error, Debug)]
pub enum MappingError {
    /// The `settings` block is missing or has the wrong cardinality.
    #[error("settings block must contain exactly one element, found {found}")]
    SettingsCardinality {
        /// Number of elements found.
        found: usize,
    },

    /// An attribute holds a value of an unexpected type.
    #[error("attribute '{attribute}' has an unexpected value: {message}")]
    InvalidAttribute {
        /// Attribute name.
        attribute: String,
        /// Underlying problem.
        message: String,
    },

    /// The API payload does not have the expected shape.
    #[error("unexpected {model} payload: {message}")]
    InvalidPayload {
        /// Model being decoded.
        model: &'static str,
        /// Underlying serde message.
        message: String,
    },

    /// The resource id is not in the format the API expects.
    #[error("invalid resource id '{id}': {message}")]
    InvalidId {
        /// The id found in state.
        id: String,
        /// Why it is invalid.
        message: String,
    },
}

/// Errors that can occur while parsing an import identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The identifier is not `<project>/<resource>`.
    #[error("import id '{id}' must be of the form <project id or name>/<resource id>")]
    InvalidFormat {
        /// The identifier that was supplied.
        id: String,
    },

    /// The project part of the identifier does not resolve to a project.
    #[error("project '{project}' referenced by the import id does not exist")]
    ProjectNotFound {
        /// Project name or id that was looked up.
        project: String,
    },
}

/// Type alias for Results using ProviderError.
///
/// Note: This is not re-exported from the crate root to avoid shadowing `anyhow::Result`.
/// Use explicitly as `error::ProviderResult<T>` when needed.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
