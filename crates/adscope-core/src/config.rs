//! Configuration management for adscope.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::DEFAULT_NAMESPACE;
use directories::ProjectDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/adscope/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Measurement scope and pipeline settings
    pub measurement: MeasurementConfig,
    /// Remote telemetry transport settings
    pub telemetry: TelemetryConfig,
    /// Participant survey settings
    pub survey: SurveyConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `ADSCOPE_DEVELOPMENT_MODE`: Override development mode (true/false)
    /// - `ADSCOPE_DOMAINS`: Comma-separated list of domains in scope
    /// - `ADSCOPE_HANDLER_TIMEOUT_SECS`: Override per-report handler timeout
    /// - `ADSCOPE_TELEMETRY_ENDPOINT`: Override the ping submission endpoint
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// Unparseable values are ignored and the configured value is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("ADSCOPE_DEVELOPMENT_MODE") {
            if let Ok(enabled) = val.parse() {
                self.measurement.development_mode = enabled;
                tracing::debug!("Override measurement.development_mode from env: {}", enabled);
            }
        }

        if let Some(val) = lookup("ADSCOPE_DOMAINS") {
            self.measurement.domains = val
                .split(',')
                .map(str::trim)
                .filter(|domain| !domain.is_empty())
                .map(String::from)
                .collect();
            tracing::debug!(
                "Override measurement.domains from env: {} domains",
                self.measurement.domains.len()
            );
        }

        if let Some(val) = lookup("ADSCOPE_HANDLER_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.measurement.handler_timeout_secs = secs;
                tracing::debug!("Override measurement.handler_timeout_secs from env: {}", secs);
            }
        }

        if let Some(val) = lookup("ADSCOPE_TELEMETRY_ENDPOINT") {
            tracing::debug!("Override telemetry.endpoint from env: {}", val);
            self.telemetry.endpoint = val;
        }
    }

    /// Check value constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        static NAMESPACE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = NAMESPACE_REGEX
            .get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid regex"));

        if !regex.is_match(&self.measurement.namespace) {
            return Err(ConfigError::InvalidValue {
                field: "measurement.namespace".to_string(),
                reason: format!(
                    "must be alphanumeric and start with a letter, got '{}'",
                    self.measurement.namespace
                ),
            });
        }

        if self.measurement.handler_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "measurement.handler_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.measurement.max_concurrent_reports == 0 {
            return Err(ConfigError::InvalidValue {
                field: "measurement.max_concurrent_reports".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.telemetry.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "telemetry.request_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/adscope/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "adscope", "adscope").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Measurement scope and pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Domains whose pages receive the scanning agent
    pub domains: Vec<String>,
    /// Also match every subdomain of the configured domains
    pub match_subdomains: bool,
    /// Write records to the diagnostic log instead of sending pings
    pub development_mode: bool,
    /// Prefix for record type tags and diagnostic keys
    pub namespace: String,
    /// Upper bound on a single report's handling time, in seconds
    pub handler_timeout_secs: u64,
    /// Number of reports handled concurrently
    pub max_concurrent_reports: usize,
    /// Number of handling outcomes retained for inspection
    pub outcome_log_capacity: usize,
}

impl MeasurementConfig {
    /// Handler timeout as a `Duration`.
    #[must_use]
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            match_subdomains: true,
            development_mode: false,
            namespace: DEFAULT_NAMESPACE.to_string(),
            handler_timeout_secs: 30,
            max_concurrent_reports: 16,
            outcome_log_capacity: 1000,
        }
    }
}

/// Remote telemetry transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Base URL that pings are submitted under
    pub endpoint: String,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl TelemetryConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/submit/adscope".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Participant survey settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    /// Survey identifier assigned to this participant, if known
    pub survey_id: Option<String>,
}
