//! Declarative attribute schemas for provider resources.
//!
//! A [`Schema`] describes the flat configuration a resource accepts: attribute
//! types, whether they are required, optional or computed, default values, and
//! value validators. Nested single blocks (such as `settings`) are expressed
//! as [`AttributeType::Block`] lists with `max_items = 1`.
//!
//! Validation collects every problem instead of stopping at the first one, so
//! a user sees all mistakes of a configuration at once.
//!
//! ## Example
//!
//! ```rust
//! use azdo_provider::schema::{Attribute, AttributeType, Schema, Validator};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .with("project_id", Attribute::required(AttributeType::String).validate(Validator::IsUuid))
//!     .with("enabled", Attribute::optional(AttributeType::Bool).with_default(json!(true)));
//!
//! let mut config = json!({ "project_id": "cbdc66da-9728-4af8-aada-9a5a32e4a226" })
//!     .as_object()
//!     .cloned()
//!     .unwrap();
//! schema.apply_defaults(&mut config);
//! assert!(schema.validate(&config).is_ok());
//! assert_eq!(config["enabled"], json!(true));
//! ```

mod validation;

pub use validation::{Validator, is_uuid};

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Diagnostic, SchemaError};
use validation::type_name;

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    Int,
    /// Homogeneous list of the element type.
    List(Box<AttributeType>),
    /// String to string map.
    Map,
    /// List of nested objects described by their own schema.
    Block(Box<Schema>),
}

impl AttributeType {
    /// Wraps a nested schema as a block type.
    pub fn block(schema: Schema) -> Self {
        Self::Block(Box::new(schema))
    }

    /// List of strings.
    pub fn string_list() -> Self {
        Self::List(Box::new(Self::String))
    }

    /// The value an unset optional attribute of this type reads as.
    fn zero_value(&self) -> Value {
        match self {
            AttributeType::String => Value::String(String::new()),
            AttributeType::Bool => Value::Bool(false),
            AttributeType::Int => Value::from(0),
            AttributeType::List(_) | AttributeType::Block(_) => Value::Array(Vec::new()),
            AttributeType::Map => Value::Object(Map::new()),
        }
    }
}

/// Who supplies an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Must be set in configuration.
    Required,
    /// May be set in configuration; falls back to a default or zero value.
    Optional,
    /// Only ever set by the provider from API responses.
    Computed,
}

/// Declaration of a single attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub kind: AttributeType,
    pub presence: Presence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Changing the value requires destroying and recreating the resource.
    pub force_new: bool,
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub description: &'static str,
}

impl Attribute {
    fn new(kind: AttributeType, presence: Presence) -> Self {
        Self {
            kind,
            presence,
            default: None,
            force_new: false,
            sensitive: false,
            min_items: None,
            max_items: None,
            validators: Vec::new(),
            description: "",
        }
    }

    pub fn required(kind: AttributeType) -> Self {
        Self::new(kind, Presence::Required)
    }

    pub fn optional(kind: AttributeType) -> Self {
        Self::new(kind, Presence::Optional)
    }

    pub fn computed(kind: AttributeType) -> Self {
        Self::new(kind, Presence::Computed)
    }

    /// A required block holding exactly one element.
    pub fn single_block(schema: Schema) -> Self {
        Self::required(AttributeType::block(schema))
            .min_items(1)
            .max_items(1)
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// A set of named attribute declarations.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Schema {
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an attribute declaration.
    pub fn with(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    /// Merges every declaration of `other` into this schema, `other` winning on conflicts.
    pub fn extend(&mut self, other: Schema) {
        self.attributes.extend(other.attributes);
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mutable access to the nested schema of a block attribute.
    pub fn block_schema_mut(&mut self, name: &str) -> Option<&mut Schema> {
        match self.attributes.get_mut(name).map(|a| &mut a.kind) {
            Some(AttributeType::Block(schema)) => Some(schema.as_mut()),
            _ => None,
        }
    }

    /// Names of top-level attributes whose change forces replacement.
    pub fn force_new_attributes(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(_, a)| a.force_new)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Fills unset optional attributes with their default, or with the zero
    /// value of their type when no default is declared. Recurses into blocks.
    pub fn apply_defaults(&self, attrs: &mut Map<String, Value>) {
        for (name, attribute) in &self.attributes {
            let unset = attrs.get(name).is_none_or(Value::is_null);

            if unset {
                if attribute.presence == Presence::Optional {
                    let value = attribute
                        .default
                        .clone()
                        .unwrap_or_else(|| attribute.kind.zero_value());
                    attrs.insert(name.clone(), value);
                }
                continue;
            }

            if let AttributeType::Block(nested) = &attribute.kind
                && let Some(Value::Array(elements)) = attrs.get_mut(name)
            {
                for element in elements.iter_mut() {
                    if let Value::Object(obj) = element {
                        nested.apply_defaults(obj);
                    }
                }
            }
        }
    }

    /// Validates a configuration, returning every diagnostic found.
    pub fn validate(&self, attrs: &Map<String, Value>) -> Result<(), SchemaError> {
        let mut diagnostics = Vec::new();
        self.validate_into("", attrs, &mut diagnostics);

        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(SchemaError { diagnostics })
        }
    }

    fn validate_into(&self, prefix: &str, attrs: &Map<String, Value>, out: &mut Vec<Diagnostic>) {
        for key in attrs.keys() {
            if !self.attributes.contains_key(key) {
                out.push(Diagnostic::new(
                    format!("{prefix}{key}"),
                    "unsupported attribute",
                ));
            }
        }

        for (name, attribute) in &self.attributes {
            let path = format!("{prefix}{name}");
            let value = attrs.get(name).filter(|v| !v.is_null());

            let Some(value) = value else {
                if attribute.presence == Presence::Required {
                    out.push(Diagnostic::new(path, "required attribute is missing"));
                }
                continue;
            };

            if attribute.presence == Presence::Computed {
                out.push(Diagnostic::new(
                    path,
                    "attribute is computed and cannot be configured",
                ));
                continue;
            }

            check_value(&path, attribute, value, out);
        }
    }
}

fn check_value(path: &str, attribute: &Attribute, value: &Value, out: &mut Vec<Diagnostic>) {
    match &attribute.kind {
        AttributeType::List(element_kind) => {
            let Some(elements) = value.as_array() else {
                out.push(type_mismatch(path, "list", value));
                return;
            };
            check_cardinality(path, attribute, elements.len(), out);
            for (i, element) in elements.iter().enumerate() {
                let element_path = format!("{path}.{i}");
                if check_scalar_type(&element_path, element_kind, element, out) {
                    run_validators(&element_path, &attribute.validators, element, false, out);
                }
            }
        }
        AttributeType::Block(nested) => {
            let Some(elements) = value.as_array() else {
                out.push(type_mismatch(path, "block list", value));
                return;
            };
            check_cardinality(path, attribute, elements.len(), out);
            for (i, element) in elements.iter().enumerate() {
                match element.as_object() {
                    Some(obj) => nested.validate_into(&format!("{path}.{i}."), obj, out),
                    None => out.push(type_mismatch(&format!("{path}.{i}"), "object", element)),
                }
            }
        }
        kind => {
            if check_scalar_type(path, kind, value, out) {
                let unset_optional = attribute.presence == Presence::Optional
                    && value.as_str().is_some_and(str::is_empty);
                run_validators(path, &attribute.validators, value, unset_optional, out);
            }
        }
    }
}

fn check_scalar_type(
    path: &str,
    kind: &AttributeType,
    value: &Value,
    out: &mut Vec<Diagnostic>,
) -> bool {
    let ok = match kind {
        AttributeType::String => value.is_string(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::Int => value.is_i64() || value.is_u64(),
        AttributeType::Map => value
            .as_object()
            .is_some_and(|m| m.values().all(Value::is_string)),
        AttributeType::List(_) | AttributeType::Block(_) => value.is_array(),
    };
    if !ok {
        let expected = match kind {
            AttributeType::String => "string",
            AttributeType::Bool => "bool",
            AttributeType::Int => "integer",
            AttributeType::Map => "map of strings",
            AttributeType::List(_) | AttributeType::Block(_) => "list",
        };
        out.push(type_mismatch(path, expected, value));
    }
    ok
}

fn check_cardinality(path: &str, attribute: &Attribute, len: usize, out: &mut Vec<Diagnostic>) {
    if let Some(min) = attribute.min_items
        && len < min
    {
        out.push(Diagnostic::new(
            path,
            format!("expected at least {min} element(s), got {len}"),
        ));
    }
    if let Some(max) = attribute.max_items
        && len > max
    {
        out.push(Diagnostic::new(
            path,
            format!("expected at most {max} element(s), got {len}"),
        ));
    }
}

/// `unset_optional` marks the zero value of an optional string, which skips
/// the UUID check.
fn run_validators(
    path: &str,
    validators: &[Validator],
    value: &Value,
    unset_optional: bool,
    out: &mut Vec<Diagnostic>,
) {
    for validator in validators {
        if unset_optional && *validator == Validator::IsUuid {
            continue;
        }
        if let Err(message) = validator.check(value) {
            out.push(Diagnostic::new(path, message));
        }
    }
}

fn type_mismatch(path: &str, expected: &str, value: &Value) -> Diagnostic {
    Diagnostic::new(
        path,
        format!("expected {expected}, got {}", type_name(value)),
    )
}
