use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

// ============================================================================
// Azure DevOps REST models
// ============================================================================

/// A branch policy configuration as stored by the policy service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfiguration {
    /// Server-assigned id, absent on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i32>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_blocking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
    #[serde(rename = "type")]
    pub policy_type: PolicyTypeRef,
    /// Type specific payload; every type shares the `scope` key.
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Reference to a policy type by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTypeRef {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PolicyTypeRef {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            display_name: None,
            url: None,
        }
    }
}

/// One entry of the `scope` array inside policy settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_kind: Option<String>,
}

/// A service connection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<EndpointAuthorization>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub service_endpoint_project_references: Vec<ServiceEndpointProjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_shared: Option<bool>,
}

/// Credentials scheme and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAuthorization {
    pub scheme: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Sharing of a service endpoint into one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpointProjectReference {
    pub project_reference: ProjectReference,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A team project, as returned by the core projects API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamProject {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

// ============================================================================
// CLI Arguments
// ============================================================================

/// Command line interface of the provider.
#[derive(Parser, Debug)]
#[command(
    name = "azdo-provider",
    version,
    about = "Manage Azure DevOps branch policies and service endpoints declaratively"
)]
pub struct Args {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection settings shared by every command that talks to Azure DevOps.
#[derive(ClapArgs, Clone, Default, Debug)]
pub struct ConnectionArgs {
    /// Organization URL, e.g. https://dev.azure.com/my-org
    #[arg(long, global = true, help_heading = "Azure DevOps Connection")]
    pub org_service_url: Option<String>,

    /// Personal Access Token for Azure DevOps API authentication
    #[arg(short = 't', long, global = true, help_heading = "Azure DevOps Connection")]
    pub personal_access_token: Option<String>,

    /// Provider config file [default: $XDG_CONFIG_HOME/azdo-provider/config.toml]
    #[arg(long, global = true, help_heading = "Azure DevOps Connection")]
    pub config: Option<PathBuf>,
}

/// Logging flags. They are read before clap runs so logging covers argument
/// handling too; declared here for `--help`.
#[derive(ClapArgs, Clone, Default, Debug)]
pub struct LoggingArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, help_heading = "Logging")]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, help_heading = "Logging")]
    pub log_file: Option<PathBuf>,

    /// Log format (text, json)
    #[arg(long, global = true, help_heading = "Logging")]
    pub log_format: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check a resource file against its schema without calling the API
    Validate {
        /// TOML resource file
        file: PathBuf,
    },
    /// Create the resource, or bring an existing one in line with the file
    Apply {
        /// TOML resource file
        file: PathBuf,
        /// JSON state file read before and written after the operation
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Refresh a state file from the API
    Read {
        #[arg(long)]
        state: PathBuf,
    },
    /// Delete the resource recorded in a state file
    Destroy {
        #[arg(long)]
        state: PathBuf,
    },
    /// Adopt an existing resource given as <project id or name>/<resource id>
    Import {
        /// Resource type, e.g. azuredevops_serviceendpoint_azurecr
        resource_type: String,
        /// Import id
        id: String,
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Print the schema of one or all resource types as JSON
    Schema {
        resource_type: Option<String>,
    },
}
