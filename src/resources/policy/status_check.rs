//! Status check branch policy (`azuredevops_branch_policy_status_check`).
//!
//! Requires a named status to be posted to pull requests before they can
//! complete. The API encodes applicability as an absent key (`default`) or
//! the number `1` (`conditional`); flatten reads anything other than `1` as
//! `default`, expand only writes the key for `conditional`.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value, json};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{
    PolicyCrudArgs, PolicyResource, PolicyType, base_expand, base_flatten,
    gen_base_policy_resource,
};
use crate::error::MappingError;
use crate::models::PolicyConfiguration;
use crate::resource_data::{ResourceData, SETTINGS};
use crate::schema::{Attribute, AttributeType, Schema, Validator};

pub const RESOURCE_TYPE: &str = "azuredevops_branch_policy_status_check";

/// Whether the status check always applies or only under conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Applicability {
    #[default]
    Default,
    Conditional,
}

impl Applicability {
    pub const VALUES: [&'static str; 2] = ["default", "conditional"];

    pub fn as_str(self) -> &'static str {
        match self {
            Applicability::Default => "default",
            Applicability::Conditional => "conditional",
        }
    }

    /// API encoding: absent for `default`, `1` for `conditional`.
    pub fn to_api(self) -> Option<Number> {
        match self {
            Applicability::Default => None,
            Applicability::Conditional => Some(Number::from(1)),
        }
    }

    /// Anything but the number 1 reads as `default`.
    pub fn from_api(value: Option<&Number>) -> Self {
        match value.and_then(Number::as_f64) {
            Some(v) if v == 1.0 => Applicability::Conditional,
            _ => Applicability::Default,
        }
    }
}

impl fmt::Display for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Applicability {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Applicability::Default),
            "conditional" => Ok(Applicability::Conditional),
            other => Err(MappingError::InvalidAttribute {
                attribute: format!("{SETTINGS}.0.applicability"),
                message: format!("unknown applicability '{other}'"),
            }),
        }
    }
}

/// The status check keys of a policy configuration's settings payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCheckPolicySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidate_on_source_update: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_display_name: Option<String>,
    /// `None` when the key is absent or null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_applicability: Option<Number>,
}

impl StatusCheckPolicySettings {
    fn decode(settings: &serde_json::Map<String, Value>) -> Result<Self, MappingError> {
        serde_json::from_value(Value::Object(settings.clone())).map_err(|e| {
            MappingError::InvalidPayload {
                model: "status check settings",
                message: e.to_string(),
            }
        })
    }

    fn encode(&self) -> Result<serde_json::Map<String, Value>, MappingError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Ok(serde_json::Map::new()),
            Err(e) => Err(MappingError::InvalidPayload {
                model: "status check settings",
                message: e.to_string(),
            }),
        }
    }
}

/// The status check keys of the configured `settings` block.
#[derive(Debug, Deserialize)]
struct StatusCheckConfig {
    name: String,
    #[serde(default)]
    genre: String,
    #[serde(default)]
    author_id: String,
    #[serde(default)]
    invalidate_on_update: bool,
    #[serde(default)]
    applicability: Option<String>,
    #[serde(default)]
    filename_patterns: Vec<String>,
    #[serde(default)]
    display_name: String,
}

/// Builds the status check resource.
pub fn resource() -> PolicyResource {
    gen_base_policy_resource(
        RESOURCE_TYPE,
        PolicyCrudArgs {
            flatten_func: flatten,
            expand_func: expand,
            policy_type: PolicyType::StatusCheck,
        },
    )
    .with_settings(settings_schema())
}

fn settings_schema() -> Schema {
    Schema::new()
        .with(
            "name",
            Attribute::required(AttributeType::String).describe("Status to check"),
        )
        .with("genre", Attribute::optional(AttributeType::String))
        .with(
            "author_id",
            Attribute::optional(AttributeType::String).validate(Validator::IsUuid),
        )
        .with(
            "invalidate_on_update",
            Attribute::optional(AttributeType::Bool).with_default(json!(false)),
        )
        .with(
            "applicability",
            Attribute::optional(AttributeType::String)
                .with_default(json!(Applicability::Default.as_str()))
                .validate(Validator::one_of(&Applicability::VALUES)),
        )
        .with(
            "filename_patterns",
            Attribute::optional(AttributeType::string_list())
                .validate(Validator::StringIsNotEmpty),
        )
        .with(
            "display_name",
            Attribute::optional(AttributeType::String).with_default(json!("")),
        )
}

/// API → configuration.
pub fn flatten(
    d: &mut ResourceData,
    config: &PolicyConfiguration,
    project_id: &str,
) -> Result<(), MappingError> {
    base_flatten(d, config, project_id)?;

    let payload = StatusCheckPolicySettings::decode(&config.settings)?;
    let settings = d.settings_mut()?;

    settings.insert("name".into(), json!(payload.status_name.unwrap_or_default()));
    settings.insert("genre".into(), json!(payload.status_genre.unwrap_or_default()));
    settings.insert("author_id".into(), json!(payload.author_id.unwrap_or_default()));
    settings.insert(
        "invalidate_on_update".into(),
        json!(payload.invalidate_on_source_update.unwrap_or_default()),
    );
    settings.insert(
        "display_name".into(),
        json!(payload.default_display_name.unwrap_or_default()),
    );
    if let Some(patterns) = payload.filename_patterns {
        settings.insert("filename_patterns".into(), json!(patterns));
    }
    settings.insert(
        "applicability".into(),
        json!(Applicability::from_api(payload.policy_applicability.as_ref()).as_str()),
    );
    Ok(())
}

/// Configuration → API.
pub fn expand(
    d: &ResourceData,
    type_id: Uuid,
) -> Result<(PolicyConfiguration, String), MappingError> {
    let (mut config, project_id) = base_expand(d, type_id)?;
    let configured: StatusCheckConfig = d.decode_settings()?;

    let applicability = match configured.applicability.as_deref() {
        None | Some("") => Applicability::Default,
        Some(value) => value.parse()?,
    };

    let payload = StatusCheckPolicySettings {
        status_name: Some(configured.name),
        status_genre: Some(configured.genre),
        author_id: Some(configured.author_id),
        invalidate_on_source_update: Some(configured.invalidate_on_update),
        default_display_name: Some(configured.display_name),
        filename_patterns: Some(configured.filename_patterns),
        policy_applicability: applicability.to_api(),
    };
    config.settings.extend(payload.encode()?);

    Ok((config, project_id))
}
