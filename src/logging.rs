//! Logging infrastructure for azdo-provider.
//!
//! Logging is off unless a level is requested. Output goes to stderr, or to a
//! file, as text or JSON. Stdout stays reserved for command output such as
//! state documents and schemas.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a log level from a string.
    ///
    /// Accepts the Terraform spellings too (`TF_LOG=DEBUG`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Configuration for the logging system.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LogConfig {
    /// Log level (None means logging is disabled).
    pub level: Option<LogLevel>,
    /// Output file path (None means stderr).
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}

/// Guard that must be held to ensure logs are flushed.
pub struct LogGuard {
    _guard: WorkerGuard,
}

/// Initialize the logging system.
///
/// Returns `None` when logging is disabled or the log file cannot be opened.
///
/// # Example
///
/// ```rust,no_run
/// use azdo_provider::logging::{LogConfig, LogFormat, LogLevel, init_logging};
///
/// let _guard = init_logging(LogConfig {
///     level: Some(LogLevel::Debug),
///     file: None,
///     format: LogFormat::Json,
/// });
/// ```
#[must_use = "the returned guard must be held until application exit"]
pub fn init_logging(config: LogConfig) -> Option<LogGuard> {
    let level = config.level?;

    // Only this crate; the SDK's HTTP stack is noisy at debug.
    let filter = EnvFilter::new(format!("azdo_provider={}", level.as_filter_str()));

    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };
    let to_file = config.file.is_some();

    match config.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .with_writer(writer)
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_file(to_file)
                .with_line_number(to_file);

            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .init();
        }
        LogFormat::Text => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(!to_file)
                .with_target(true)
                .with_level(true)
                .compact();

            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .init();
        }
    }

    Some(LogGuard { _guard: guard })
}

/// Parse logging configuration from command-line arguments and environment.
///
/// Runs before clap so argument handling is logged too.
/// Precedence: CLI args > `AZDO_LOG_*` > `TF_LOG` / `TF_LOG_PATH`.
#[must_use]
pub fn parse_early_log_config(args: &[String]) -> LogConfig {
    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

    let level = extract_arg_value(args, "--log-level")
        .or_else(|| env("AZDO_LOG_LEVEL"))
        .or_else(|| env("TF_LOG"));
    let file = extract_arg_value(args, "--log-file")
        .or_else(|| env("AZDO_LOG_FILE"))
        .or_else(|| env("TF_LOG_PATH"));
    let format = extract_arg_value(args, "--log-format").or_else(|| env("AZDO_LOG_FORMAT"));

    LogConfig {
        level: level.and_then(|s| LogLevel::parse(&s)),
        file: file.map(PathBuf::from),
        format: format
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or_default(),
    }
}

/// Extract a flag's value, given as `--flag value` or `--flag=value`.
fn extract_arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    args.iter()
        .find_map(|a| a.strip_prefix(&prefix).map(str::to_string))
        .or_else(|| args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::file_serial;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn clear_env() {
        for name in [
            "AZDO_LOG_LEVEL",
            "AZDO_LOG_FILE",
            "AZDO_LOG_FORMAT",
            "TF_LOG",
            "TF_LOG_PATH",
        ] {
            unsafe { std::env::remove_var(name) };
        }
    }

    /// # Log Level Parsing
    ///
    /// Verifies that log levels are parsed correctly from strings.
    ///
    /// ## Test Scenario
    /// - Parse valid log level strings in several casings
    /// - Parse invalid log level strings
    ///
    /// ## Expected Outcome
    /// - Valid strings return the corresponding LogLevel
    /// - Invalid strings return None
    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::parse("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("Info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("verbose"), None);
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("yaml"), None);
    }

    /// # Early Config From Args
    ///
    /// Verifies that flags are extracted in both spellings.
    ///
    /// ## Test Scenario
    /// - Parses `--log-level debug`, `--log-format=json` and `--log-file path`
    ///
    /// ## Expected Outcome
    /// - All three values are picked up
    #[test]
    #[file_serial(env_tests)]
    fn test_early_config_from_args() {
        clear_env();
        let config = parse_early_log_config(&args(&[
            "azdo-provider",
            "--log-level",
            "debug",
            "--log-format=json",
            "--log-file",
            "/tmp/azdo.log",
            "schema",
        ]));

        assert_eq!(config.level, Some(LogLevel::Debug));
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/azdo.log")));
    }

    /// # Environment Fallbacks
    ///
    /// Verifies the precedence between CLI, AZDO_LOG_* and TF_LOG.
    ///
    /// ## Test Scenario
    /// - Sets TF_LOG only, then AZDO_LOG_LEVEL too, then passes a flag
    /// - Parses with nothing set
    ///
    /// ## Expected Outcome
    /// - The most specific source wins at each step
    /// - Logging is disabled when nothing is set
    #[test]
    #[file_serial(env_tests)]
    fn test_environment_fallbacks() {
        clear_env();
        assert_eq!(parse_early_log_config(&args(&["azdo-provider"])), LogConfig::default());

        unsafe { std::env::set_var("TF_LOG", "TRACE") };
        assert_eq!(
            parse_early_log_config(&args(&["azdo-provider"])).level,
            Some(LogLevel::Trace)
        );

        unsafe { std::env::set_var("AZDO_LOG_LEVEL", "warn") };
        assert_eq!(
            parse_early_log_config(&args(&["azdo-provider"])).level,
            Some(LogLevel::Warn)
        );

        assert_eq!(
            parse_early_log_config(&args(&["azdo-provider", "--log-level", "error"])).level,
            Some(LogLevel::Error)
        );
        clear_env();
    }

    /// # Extract Arg Value
    ///
    /// Verifies flag value extraction edge cases.
    ///
    /// ## Test Scenario
    /// - Flag at the end without value, and a missing flag
    ///
    /// ## Expected Outcome
    /// - Both return None
    #[test]
    fn test_extract_arg_value() {
        assert_eq!(extract_arg_value(&args(&["cmd", "--flag"]), "--flag"), None);
        assert_eq!(extract_arg_value(&args(&["cmd", "x"]), "--flag"), None);
        assert_eq!(
            extract_arg_value(&args(&["cmd", "--flag=v"]), "--flag"),
            Some("v".to_string())
        );
    }
}
