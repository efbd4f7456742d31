//! Value validators attached to schema attributes.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A check applied to an attribute value after its type has been verified.
///
/// On list attributes the validator is applied to every element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Validator {
    /// The value must be a hyphenated UUID. An unset optional attribute
    /// (empty string) is let through by the schema, not by this check.
    IsUuid,
    /// The value must be a non-empty string.
    StringIsNotEmpty,
    /// The value must be one of the listed strings.
    StringInSlice {
        values: Vec<&'static str>,
        ignore_case: bool,
    },
}

impl Validator {
    /// Shorthand for a case sensitive enumeration.
    pub fn one_of(values: &[&'static str]) -> Self {
        Self::StringInSlice {
            values: values.to_vec(),
            ignore_case: false,
        }
    }

    /// Shorthand for a case insensitive enumeration.
    pub fn one_of_ignore_case(values: &[&'static str]) -> Self {
        Self::StringInSlice {
            values: values.to_vec(),
            ignore_case: true,
        }
    }

    /// Checks a value, returning a human readable reason on failure.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        let Some(s) = value.as_str() else {
            return Err(format!("expected a string, got {}", type_name(value)));
        };

        match self {
            Validator::IsUuid => {
                if is_uuid(s) {
                    Ok(())
                } else {
                    Err(format!("expected a UUID, got '{}'", s))
                }
            }
            Validator::StringIsNotEmpty => {
                if s.is_empty() {
                    Err("expected a non-empty string".to_string())
                } else {
                    Ok(())
                }
            }
            Validator::StringInSlice {
                values,
                ignore_case,
            } => {
                let found = values.iter().any(|allowed| {
                    if *ignore_case {
                        allowed.eq_ignore_ascii_case(s)
                    } else {
                        *allowed == s
                    }
                });
                if found {
                    Ok(())
                } else {
                    Err(format!(
                        "expected one of [{}], got '{}'",
                        values.join(", "),
                        s
                    ))
                }
            }
        }
    }
}

/// Returns true for the hyphenated 36 character form the service uses.
#[must_use]
pub fn is_uuid(s: &str) -> bool {
    s.len() == 36 && Uuid::try_parse(s).is_ok()
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
