//! Application configuration management.
//!
//! Configuration is assembled once at startup from built-in defaults, an
//! optional TOML file, a `.env` file and the process environment, then
//! validated and injected everywhere else. Later sources win.

use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Endpoint polled when nothing else is configured
pub const DEFAULT_API_URL: &str = "https://co2.leyrer.io/api/co2data/1/latest";

/// Environment variables understood by the application and the config keys
/// they override.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("API_URL", "poll.api_url"),
    ("X_API_KEY", "poll.api_key"),
    ("POLL_INTERVAL_SECS", "poll.interval_secs"),
];

/// Top-level application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Polling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_pulse")]
    pub pulse_ms: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Terminal UI configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    #[serde(default = "default_spinner")]
    pub spinner_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

// Default value functions
fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_interval() -> u64 {
    10
}

fn default_pulse() -> u64 {
    100
}

fn default_timeout() -> u64 {
    10
}

fn default_spinner() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            interval_secs: default_interval(),
            pulse_ms: default_pulse(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            spinner_ms: default_spinner(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn pulse_period(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl UiConfig {
    pub fn spinner_period(&self) -> Duration {
        Duration::from_millis(self.spinner_ms)
    }
}

/// Environment variables visible to the application.
///
/// Collected once at startup so the rest of the program never touches the
/// process environment. Entries that cannot be used are recorded in
/// [`EnvVars::warnings`] and reported once logging is up.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
    dotenv_loaded: bool,
    warnings: Vec<String>,
}

impl EnvVars {
    /// Read the `.env` file at `dotenv` (if any), then the process
    /// environment on top of it.
    pub fn load<P: AsRef<Path>>(dotenv: P) -> Self {
        let mut env = Self::from_dotenv(dotenv);
        env.extend_os(std::env::vars_os());
        env
    }

    /// Read only the `.env` file. A missing or unreadable file yields an
    /// empty set with [`EnvVars::dotenv_loaded`] unset.
    pub fn from_dotenv<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let Ok(iter) = dotenvy::from_path_iter(path) else {
            return Self::default();
        };

        let mut env = Self {
            dotenv_loaded: true,
            ..Self::default()
        };
        for item in iter {
            match item {
                Ok((key, value)) => {
                    env.vars.insert(key, value);
                }
                Err(e) => env
                    .warnings
                    .push(format!("Skipping malformed line in {}: {}", path.display(), e)),
            }
        }
        env
    }

    /// Add OS-encoded pairs, skipping those that are not valid UTF-8.
    pub fn extend_os<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        for (key, value) in pairs {
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => {
                    self.vars.insert(key, value);
                }
                (Ok(key), Err(_)) => self
                    .warnings
                    .push(format!("Ignoring environment variable {key}: value is not valid UTF-8")),
                (Err(key), _) => self.warnings.push(format!(
                    "Ignoring environment variable {}: name is not valid UTF-8",
                    key.to_string_lossy()
                )),
            }
        }
    }

    /// Build from explicit pairs
    #[cfg(test)]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Problems found while collecting the variables
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Whether a `.env` file was found and read
    pub fn dotenv_loaded(&self) -> bool {
        self.dotenv_loaded
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file plus environment
    /// overrides.
    pub fn load<P: AsRef<Path>>(path: P, env: &EnvVars) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(ConfigError::InvalidValue {
                field: "config".to_string(),
                message: format!("{} is a directory", path.display()),
            }
            .into());
        }

        let mut builder = Config::builder().add_source(
            File::from(path)
                .format(FileFormat::Toml)
                .required(false),
        );

        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = env.get(var) {
                builder = builder
                    .set_override(*key, value)
                    .map_err(ConfigError::from)?;
            }
        }

        let config: AppConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(ConfigError::from)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.poll.api_url.trim().is_empty() {
            return Err(invalid("poll.api_url", "cannot be empty"));
        }

        if self.poll.interval_secs == 0 {
            return Err(invalid("poll.interval_secs", "must be greater than 0"));
        }

        if self.poll.pulse_ms == 0 {
            return Err(invalid("poll.pulse_ms", "must be greater than 0"));
        }

        if self.poll.timeout_secs == 0 {
            return Err(invalid("poll.timeout_secs", "must be greater than 0"));
        }

        if self.ui.spinner_ms == 0 {
            return Err(invalid("ui.spinner_ms", "must be greater than 0"));
        }

        Ok(())
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) -> Result<()> {
        if let Some(url) = &cli.url {
            self.poll.api_url = url.clone();
        }

        if let Some(interval) = cli.interval {
            self.poll.interval_secs = interval;
        }

        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }

        if let Some(file) = &cli.log_file {
            self.logging.file = Some(file.clone());
        }

        self.validate()
    }

    /// The API key, treating a blank value as absent
    pub fn api_key(&self) -> Option<&str> {
        self.poll
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

fn invalid(field: &str, message: &str) -> crate::error::AppError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.poll.api_url, DEFAULT_API_URL);
        assert_eq!(config.poll.interval_secs, 10);
        assert_eq!(config.poll.pulse_ms, 100);
        assert!(config.poll.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            AppConfig::load(dir.path().join("absent.toml"), &EnvVars::default()).unwrap();
        assert_eq!(config.poll.api_url, DEFAULT_API_URL);
        assert_eq!(config.ui.spinner_ms, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("co2-monitor.toml");
        fs::write(
            &path,
            r#"
[poll]
api_url = "http://file.example/latest"
api_key = "from-file"
interval_secs = 30

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let env = EnvVars::from_pairs([("X_API_KEY", "from-env"), ("POLL_INTERVAL_SECS", "45")]);
        let config = AppConfig::load(&path, &env).unwrap();

        assert_eq!(config.poll.api_url, "http://file.example/latest");
        assert_eq!(config.api_key(), Some("from-env"));
        assert_eq!(config.poll.interval_secs, 45);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.poll.pulse_ms, 100);
    }

    #[test]
    fn test_env_api_url() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvVars::from_pairs([("API_URL", "http://localhost:9000/latest")]);
        let config = AppConfig::load(dir.path().join("none.toml"), &env).unwrap();
        assert_eq!(config.poll.api_url, "http://localhost:9000/latest");
    }

    #[test]
    fn test_dotenv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "X_API_KEY=secret\nAPI_URL=http://dotenv.example/latest\n").unwrap();

        let env = EnvVars::from_dotenv(&path);
        assert!(env.dotenv_loaded());
        assert_eq!(env.get("X_API_KEY"), Some("secret"));
        assert_eq!(env.get("API_URL"), Some("http://dotenv.example/latest"));
    }

    #[test]
    fn test_missing_dotenv_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvVars::from_dotenv(dir.path().join(".env"));
        assert!(!env.dotenv_loaded());
        assert!(env.get("X_API_KEY").is_none());
    }

    #[test]
    fn test_malformed_dotenv_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "X_API_KEY=secret\nthis is not valid\n").unwrap();

        let env = EnvVars::from_dotenv(&path);
        assert!(env.dotenv_loaded());
        assert_eq!(env.get("X_API_KEY"), Some("secret"));
        assert_eq!(env.warnings().len(), 1);
        assert!(env.warnings()[0].contains("malformed line"));
    }

    #[test]
    fn test_non_utf8_environment_is_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let mut env = EnvVars::default();
        env.extend_os([
            (OsString::from("API_URL"), OsString::from("http://localhost/latest")),
            (OsString::from("BAD_VALUE"), OsString::from_vec(b"\xff\xfe".to_vec())),
            (OsString::from_vec(b"BAD_\xffNAME".to_vec()), OsString::from("x")),
        ]);

        assert_eq!(env.get("API_URL"), Some("http://localhost/latest"));
        assert!(env.get("BAD_VALUE").is_none());
        assert_eq!(env.warnings().len(), 2);
        assert!(env.warnings()[0].contains("BAD_VALUE"));
    }

    #[test]
    fn test_load_without_dotenv_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvVars::load(dir.path().join(".env"));
        assert!(!env.dotenv_loaded());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = AppConfig::default();
        config.poll.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_url() {
        let mut config = AppConfig::default();
        config.poll.api_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let mut config = AppConfig::default();
        config.poll.api_key = Some("   ".to_string());
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn test_invalid_interval_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvVars::from_pairs([("POLL_INTERVAL_SECS", "soon")]);
        assert!(AppConfig::load(dir.path().join("none.toml"), &env).is_err());
    }
}
