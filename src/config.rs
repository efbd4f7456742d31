//! Provider configuration.
//!
//! Connection settings come from, in order of precedence: command line
//! flags, environment variables, and a TOML file at
//! `$XDG_CONFIG_HOME/azdo-provider/config.toml`. Each value remembers its
//! source so error messages can say where a bad value was set.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azdo_provider::{Config, models::ConnectionArgs};
//!
//! let config = Config::resolve(&ConnectionArgs::default()).unwrap();
//! let connection = config.connection().unwrap();
//! println!("organization URL: {}", connection.org_service_url);
//! ```

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::models::ConnectionArgs;
use crate::parsed_property::ParsedProperty;

pub const ENV_ORG_SERVICE_URL: &str = "AZDO_ORG_SERVICE_URL";
pub const ENV_PERSONAL_ACCESS_TOKEN: &str = "AZDO_PERSONAL_ACCESS_TOKEN";
pub const ENV_LOG_LEVEL: &str = "AZDO_LOG_LEVEL";

/// On-disk shape of the configuration file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    org_service_url: Option<String>,
    personal_access_token: Option<String>,
    log_level: Option<String>,
}

/// Provider configuration assembled from flags, environment and file.
#[derive(Clone, Default)]
pub struct Config {
    /// Organization URL, e.g. `https://dev.azure.com/my-org`.
    pub org_service_url: Option<ParsedProperty<String>>,
    /// Personal access token.
    pub personal_access_token: Option<ParsedProperty<String>>,
    pub log_level: Option<ParsedProperty<String>>,
}

/// Everything needed to talk to one organization.
pub struct Connection {
    pub org_service_url: String,
    pub personal_access_token: SecretString,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("org_service_url", &self.org_service_url)
            .field(
                "personal_access_token",
                &self
                    .personal_access_token
                    .as_ref()
                    .map(|p| format!("[REDACTED] from {}", p.origin())),
            )
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Loads the configuration file, returning an empty config when it does not exist.
    ///
    /// `path` overrides the XDG location.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::get_config_path()?,
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: config_path.clone(),
            message: e.to_string(),
        })?;

        let from_file = |value: Option<String>, key: &str| {
            value.map(|v| ParsedProperty::File(v, config_path.clone(), key.to_string()))
        };

        Ok(Self {
            org_service_url: from_file(file.org_service_url, "org_service_url"),
            personal_access_token: from_file(file.personal_access_token, "personal_access_token"),
            log_level: from_file(file.log_level, "log_level"),
        })
    }

    /// Loads configuration from environment variables; empty values count as unset.
    pub fn load_from_env() -> Self {
        let from_env = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| ParsedProperty::Env(v, name.to_string()))
        };

        Self {
            org_service_url: from_env(ENV_ORG_SERVICE_URL),
            personal_access_token: from_env(ENV_PERSONAL_ACCESS_TOKEN),
            log_level: from_env(ENV_LOG_LEVEL),
        }
    }

    /// Configuration given as command line flags.
    pub fn from_args(args: &ConnectionArgs) -> Self {
        let from_cli = |value: &Option<String>, flag: &str| {
            value
                .clone()
                .map(|v| ParsedProperty::Cli(v, flag.to_string()))
        };

        Self {
            org_service_url: from_cli(&args.org_service_url, "org-service-url"),
            personal_access_token: from_cli(&args.personal_access_token, "personal-access-token"),
            log_level: None,
        }
    }

    /// File, then environment, then flags; later sources win.
    pub fn resolve(args: &ConnectionArgs) -> Result<Self> {
        let file = Self::load_from_file(args.config.as_deref())?;
        Ok(file.merge(Self::load_from_env()).merge(Self::from_args(args)))
    }

    /// Path of the configuration file under the XDG config directory.
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDirectory)?
                .join(".config"),
        };
        Ok(config_dir.join("azdo-provider").join("config.toml"))
    }

    /// Merge this config with another, preferring values from other when they exist
    pub fn merge(self, other: Self) -> Self {
        Self {
            org_service_url: other.org_service_url.or(self.org_service_url),
            personal_access_token: other.personal_access_token.or(self.personal_access_token),
            log_level: other.log_level.or(self.log_level),
        }
    }

    /// The connection settings, failing when either is missing.
    pub fn connection(&self) -> Result<Connection, ConfigError> {
        let org_service_url = self
            .org_service_url
            .as_ref()
            .map(|p| p.value().trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "organization service URL".to_string(),
                flag: "org-service-url".to_string(),
                env_var: ENV_ORG_SERVICE_URL.to_string(),
            })?;

        if url::Url::parse(&org_service_url).is_err() {
            let origin = self
                .org_service_url
                .as_ref()
                .map(ParsedProperty::origin)
                .unwrap_or_default();
            return Err(ConfigError::InvalidValue {
                field: "org_service_url".to_string(),
                message: format!("'{org_service_url}' from {origin} is not a URL"),
            });
        }

        let personal_access_token = self
            .personal_access_token
            .as_ref()
            .map(|p| p.value().clone())
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "personal access token".to_string(),
                flag: "personal-access-token".to_string(),
                env_var: ENV_PERSONAL_ACCESS_TOKEN.to_string(),
            })?;

        Ok(Connection {
            org_service_url,
            personal_access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::file_serial;
    use std::env;
    use tempfile::TempDir;

    fn clear_env() {
        unsafe {
            env::remove_var(ENV_ORG_SERVICE_URL);
            env::remove_var(ENV_PERSONAL_ACCESS_TOKEN);
            env::remove_var(ENV_LOG_LEVEL);
        }
    }

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, content).unwrap();
        path
    }

    /// # Load Config From File
    ///
    /// Tests reading every supported key from a TOML file.
    ///
    /// ## Test Scenario
    /// - Writes a config file with all keys and loads it
    ///
    /// ## Expected Outcome
    /// - Each value is tagged with the file and key it came from
    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
org_service_url = "https://dev.azure.com/acme"
personal_access_token = "file-pat"
log_level = "debug"
"#,
        );

        let config = Config::load_from_file(Some(&path)).unwrap();

        assert_eq!(
            config.org_service_url,
            Some(ParsedProperty::File(
                "https://dev.azure.com/acme".to_string(),
                path.clone(),
                "org_service_url".to_string()
            ))
        );
        assert_eq!(config.log_level.as_deref().map(String::as_str), Some("debug"));
        assert_eq!(
            config.personal_access_token.unwrap().source_name(),
            "file"
        );
    }

    /// # Missing And Invalid Files
    ///
    /// Tests loading a file that does not exist and one with unknown keys.
    ///
    /// ## Test Scenario
    /// - Loads a path that does not exist
    /// - Loads a file with a misspelled key
    ///
    /// ## Expected Outcome
    /// - The missing file yields an empty config
    /// - The bad file yields ConfigError::ParseError naming the path
    #[test]
    fn test_missing_and_invalid_files() {
        let dir = TempDir::new().unwrap();
        let missing = Config::load_from_file(Some(&dir.path().join("nope.toml"))).unwrap();
        assert!(missing.org_service_url.is_none());

        let path = write_config(&dir, "org_url = \"https://dev.azure.com/acme\"\n");
        let err = Config::load_from_file(Some(&path)).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::ParseError { path: p, .. }) => assert_eq!(p, &path),
            other => panic!("unexpected error {other:?}"),
        }
    }

    /// # Source Precedence
    ///
    /// Tests that flags beat environment variables and both beat the file.
    ///
    /// ## Test Scenario
    /// - File sets URL and PAT, environment sets the PAT, flags set the URL
    ///
    /// ## Expected Outcome
    /// - URL comes from the flag, PAT from the environment
    #[test]
    #[file_serial(env_tests)]
    fn test_source_precedence() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "org_service_url = \"https://dev.azure.com/file\"\npersonal_access_token = \"file-pat\"\n",
        );
        unsafe { env::set_var(ENV_PERSONAL_ACCESS_TOKEN, "env-pat") };

        let args = ConnectionArgs {
            org_service_url: Some("https://dev.azure.com/cli".to_string()),
            personal_access_token: None,
            config: Some(path),
        };
        let config = Config::resolve(&args).unwrap();
        clear_env();

        assert_eq!(config.org_service_url.as_ref().unwrap().source_name(), "cli");
        assert_eq!(
            config.personal_access_token.as_ref().unwrap().source_name(),
            "env"
        );

        let connection = config.connection().unwrap();
        assert_eq!(connection.org_service_url, "https://dev.azure.com/cli");
        assert_eq!(connection.personal_access_token.expose_secret(), "env-pat");
    }

    /// # Missing Connection Settings
    ///
    /// Tests the errors for absent or malformed connection settings.
    ///
    /// ## Test Scenario
    /// - Requests a connection from an empty config, a config without PAT,
    ///   and a config whose URL is not a URL
    ///
    /// ## Expected Outcome
    /// - MissingRequired names the URL, then the PAT
    /// - A malformed URL is an InvalidValue naming its origin
    #[test]
    fn test_missing_connection_settings() {
        let mut config = Config::default();
        match config.connection() {
            Err(ConfigError::MissingRequired { env_var, .. }) => {
                assert_eq!(env_var, ENV_ORG_SERVICE_URL)
            }
            _ => panic!("expected missing URL"),
        }

        config.org_service_url = Some(ParsedProperty::Default("https://dev.azure.com/acme".into()));
        match config.connection() {
            Err(ConfigError::MissingRequired { env_var, .. }) => {
                assert_eq!(env_var, ENV_PERSONAL_ACCESS_TOKEN)
            }
            _ => panic!("expected missing PAT"),
        }

        config.org_service_url = Some(ParsedProperty::Env(
            "acme".into(),
            ENV_ORG_SERVICE_URL.into(),
        ));
        match config.connection() {
            Err(ConfigError::InvalidValue { message, .. }) => {
                assert!(message.contains("env AZDO_ORG_SERVICE_URL"))
            }
            _ => panic!("expected invalid URL"),
        }
    }

    /// # Debug Redacts The Token
    ///
    /// Tests that formatting the config never prints the PAT.
    ///
    /// ## Test Scenario
    /// - Formats a config holding a PAT with {:?}
    ///
    /// ## Expected Outcome
    /// - The token is absent, its source is shown
    #[test]
    fn test_debug_redacts_token() {
        let config = Config {
            personal_access_token: Some(ParsedProperty::Cli(
                "super-secret".to_string(),
                "personal-access-token".to_string(),
            )),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED] from flag --personal-access-token"));
    }

    /// # XDG Config Path
    ///
    /// Tests that XDG_CONFIG_HOME decides the config location.
    ///
    /// ## Test Scenario
    /// - Points XDG_CONFIG_HOME at a temporary directory
    ///
    /// ## Expected Outcome
    /// - The path is <dir>/azdo-provider/config.toml
    #[test]
    #[file_serial(env_tests)]
    fn test_xdg_config_path() {
        let dir = TempDir::new().unwrap();
        let previous = env::var("XDG_CONFIG_HOME").ok();
        unsafe { env::set_var("XDG_CONFIG_HOME", dir.path()) };

        let path = Config::get_config_path().unwrap();

        match previous {
            Some(value) => unsafe { env::set_var("XDG_CONFIG_HOME", value) },
            None => unsafe { env::remove_var("XDG_CONFIG_HOME") },
        }
        assert_eq!(path, dir.path().join("azdo-provider").join("config.toml"));
    }
}
