use std::{fmt::Display, ops::Deref, path::PathBuf};

/// A configuration property that tracks where its value came from.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ParsedProperty<T> {
    /// Value from a command line flag (parsed_value, flag)
    Cli(T, String),
    /// Value from an environment variable (parsed_value, variable_name)
    Env(T, String),
    /// Value from the configuration file (parsed_value, file, key)
    File(T, PathBuf, String),
    /// Built-in default
    Default(T),
}

impl<T> ParsedProperty<T> {
    pub fn value(&self) -> &T {
        match self {
            ParsedProperty::Cli(value, _)
            | ParsedProperty::Env(value, _)
            | ParsedProperty::File(value, _, _)
            | ParsedProperty::Default(value) => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            ParsedProperty::Cli(value, _)
            | ParsedProperty::Env(value, _)
            | ParsedProperty::File(value, _, _)
            | ParsedProperty::Default(value) => value,
        }
    }

    pub fn source_name(&self) -> &'static str {
        match self {
            ParsedProperty::Cli(_, _) => "cli",
            ParsedProperty::Env(_, _) => "env",
            ParsedProperty::File(_, _, _) => "file",
            ParsedProperty::Default(_) => "default",
        }
    }

    /// Human readable origin, e.g. `env AZDO_ORG_SERVICE_URL`.
    pub fn origin(&self) -> String {
        match self {
            ParsedProperty::Cli(_, flag) => format!("flag --{flag}"),
            ParsedProperty::Env(_, name) => format!("env {name}"),
            ParsedProperty::File(_, path, key) => format!("{} ({key})", path.display()),
            ParsedProperty::Default(_) => "default".to_string(),
        }
    }

    /// Same source, different value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParsedProperty<U> {
        match self {
            ParsedProperty::Cli(value, flag) => ParsedProperty::Cli(f(value), flag),
            ParsedProperty::Env(value, name) => ParsedProperty::Env(f(value), name),
            ParsedProperty::File(value, path, key) => ParsedProperty::File(f(value), path, key),
            ParsedProperty::Default(value) => ParsedProperty::Default(f(value)),
        }
    }
}

impl<T> Deref for ParsedProperty<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value()
    }
}

impl<T: Display> Display for ParsedProperty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value().fmt(f)
    }
}

impl<T> From<T> for ParsedProperty<T> {
    fn from(value: T) -> Self {
        ParsedProperty::Default(value)
    }
}
