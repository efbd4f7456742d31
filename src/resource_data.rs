//! Flat configuration and state of a single resource instance.
//!
//! [`ResourceData`] plays the role the host framework's resource data plays
//! for a Terraform provider: an optional server-assigned id plus a flat map of
//! attribute values. Configuration and state share this shape, which is what
//! lets an imported resource be compared against a created one attribute by
//! attribute.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{ImportError, MappingError};

/// Name of the single nested block every policy resource carries.
pub const SETTINGS: &str = "settings";

/// Id and attribute values of one resource instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl ResourceData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds resource data from user configuration (no id yet).
    pub fn from_attributes(attributes: Map<String, Value>) -> Self {
        Self {
            id: None,
            attributes,
        }
    }

    /// The id, or `None` when the resource does not exist (yet or anymore).
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Marks the resource as gone.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_list(&self, key: &str) -> Option<&Vec<Value>> {
        self.get(key).and_then(Value::as_array)
    }

    /// Reads a required string attribute.
    pub fn require_str(&self, key: &str) -> Result<&str, MappingError> {
        self.get_str(key)
            .ok_or_else(|| MappingError::InvalidAttribute {
                attribute: key.to_string(),
                message: "expected a string".to_string(),
            })
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    /// The single element of the `settings` block.
    pub fn settings(&self) -> Result<&Map<String, Value>, MappingError> {
        match self.attributes.get(SETTINGS) {
            Some(Value::Array(elements)) if elements.len() == 1 => {
                elements[0]
                    .as_object()
                    .ok_or_else(|| MappingError::InvalidAttribute {
                        attribute: format!("{SETTINGS}.0"),
                        message: "expected an object".to_string(),
                    })
            }
            Some(Value::Array(elements)) => Err(MappingError::SettingsCardinality {
                found: elements.len(),
            }),
            None | Some(Value::Null) => Err(MappingError::SettingsCardinality { found: 0 }),
            Some(_) => Err(MappingError::InvalidAttribute {
                attribute: SETTINGS.to_string(),
                message: "expected a block list".to_string(),
            }),
        }
    }

    /// Mutable access to the `settings` element, creating it when the block is
    /// empty so the block always holds exactly one element.
    pub fn settings_mut(&mut self) -> Result<&mut Map<String, Value>, MappingError> {
        let block = self
            .attributes
            .entry(SETTINGS.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if block.is_null() {
            *block = Value::Array(Vec::new());
        }

        let Value::Array(elements) = block else {
            return Err(MappingError::InvalidAttribute {
                attribute: SETTINGS.to_string(),
                message: "expected a block list".to_string(),
            });
        };
        if elements.is_empty() {
            elements.push(Value::Object(Map::new()));
        }
        if elements.len() != 1 {
            return Err(MappingError::SettingsCardinality {
                found: elements.len(),
            });
        }

        match &mut elements[0] {
            Value::Object(settings) => Ok(settings),
            _ => Err(MappingError::InvalidAttribute {
                attribute: format!("{SETTINGS}.0"),
                message: "expected an object".to_string(),
            }),
        }
    }

    /// Decodes the `settings` element into a typed view.
    pub fn decode_settings<T: DeserializeOwned>(&self) -> Result<T, MappingError> {
        let settings = self.settings()?;
        serde_json::from_value(Value::Object(settings.clone())).map_err(|e| {
            MappingError::InvalidAttribute {
                attribute: SETTINGS.to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Decodes the top-level attributes into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, MappingError> {
        serde_json::from_value(Value::Object(self.attributes.clone())).map_err(|e| {
            MappingError::InvalidAttribute {
                attribute: "<root>".to_string(),
                message: e.to_string(),
            }
        })
    }
}

/// Splits an import id of the form `<project>/<resource>`.
///
/// The project part may be a project id or name; both parts must be non-empty.
pub fn parse_import_id(id: &str) -> Result<(String, String), ImportError> {
    let invalid = || ImportError::InvalidFormat { id: id.to_string() };

    let mut parts = id.split('/');
    let (Some(project), Some(resource), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let (project, resource) = (project.trim(), resource.trim());
    if project.is_empty() || resource.is_empty() {
        return Err(invalid());
    }

    Ok((project.to_string(), resource.to_string()))
}
