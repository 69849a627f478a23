//! Configuration loading, validation, and management for Callscope.
//!
//! Loads configuration from `~/.callscope/config.toml` with environment
//! variable overrides. Validates all settings at startup. There is no
//! module-level mutable state: the resulting `AppConfig` is passed
//! explicitly into the client at construction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.callscope/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the wrapped upstream API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the wrapped upstream API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Telemetry capture and shipping configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

/// Telemetry capture, batching, and collector configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Collector API key. Empty/absent = telemetry disabled entirely:
    /// no background tasks are started and recording is a no-op.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Collector endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Buffer size that triggers a flush
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Seconds between time-triggered flushes
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Timeout for one collector request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Route upstream calls through the collector's proxy. Carried in
    /// config but not exercised by the telemetry core.
    #[serde(default)]
    pub proxy_enabled: bool,

    /// Custom model pricing overrides (model name → per-1M-token rates)
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverrideConfig>,
}

fn default_endpoint() -> String {
    "https://api.callscope.dev/v1/telemetry".into()
}
fn default_flush_threshold() -> usize {
    10
}
fn default_flush_interval_secs() -> u64 {
    5
}
fn default_request_timeout_secs() -> u64 {
    5
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_endpoint(),
            flush_threshold: default_flush_threshold(),
            flush_interval_secs: default_flush_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            proxy_enabled: false,
            custom_pricing: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for TelemetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryConfig")
            .field("api_key", &redact(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("flush_threshold", &self.flush_threshold)
            .field("flush_interval_secs", &self.flush_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("proxy_enabled", &self.proxy_enabled)
            .field("custom_pricing", &self.custom_pricing)
            .finish()
    }
}

impl TelemetryConfig {
    /// Whether telemetry is enabled (non-empty collector key present).
    pub fn enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.callscope/config.toml).
    ///
    /// Environment variables override file values:
    /// - `CALLSCOPE_API_KEY` — collector key (enables telemetry)
    /// - `CALLSCOPE_TELEMETRY_ENDPOINT` — collector URL
    /// - `CALLSCOPE_PROXY_ENABLED` — "true" routes calls via the collector
    /// - `CALLSCOPE_BASE_URL` — upstream API base URL
    /// - `OPENAI_API_KEY` — upstream key fallback
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(key) = std::env::var("CALLSCOPE_API_KEY") {
            config.telemetry.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("CALLSCOPE_TELEMETRY_ENDPOINT") {
            config.telemetry.endpoint = endpoint;
        }
        if let Ok(proxy) = std::env::var("CALLSCOPE_PROXY_ENABLED") {
            config.telemetry.proxy_enabled = proxy == "true";
        }
        if let Ok(base_url) = std::env::var("CALLSCOPE_BASE_URL") {
            config.base_url = base_url;
        }
        if config.api_key.is_none() {
            config.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".callscope")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "base_url must not be empty".into(),
            ));
        }

        if self.telemetry.endpoint.is_empty() {
            return Err(ConfigError::ValidationError(
                "telemetry.endpoint must not be empty".into(),
            ));
        }

        if self.telemetry.flush_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.flush_threshold must be at least 1".into(),
            ));
        }

        if self.telemetry.flush_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.flush_interval_secs must be at least 1".into(),
            ));
        }

        if self.telemetry.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.request_timeout_secs must be at least 1".into(),
            ));
        }

        for (model, pricing) in &self.telemetry.custom_pricing {
            if pricing.input_per_m < 0.0 || pricing.output_per_m < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "custom_pricing.{model}: rates must be non-negative"
                )));
            }
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.telemetry.flush_threshold, 10);
        assert_eq!(config.telemetry.flush_interval_secs, 5);
        assert_eq!(config.telemetry.request_timeout_secs, 5);
        assert!(!config.telemetry.proxy_enabled);
    }

    #[test]
    fn telemetry_disabled_without_key() {
        let config = AppConfig::default();
        assert!(!config.telemetry.enabled());

        let mut with_empty = config.clone();
        with_empty.telemetry.api_key = Some(String::new());
        assert!(!with_empty.telemetry.enabled());

        let mut with_key = config;
        with_key.telemetry.api_key = Some("cs_live_abc".into());
        assert!(with_key.telemetry.enabled());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.base_url, config.base_url);
        assert_eq!(
            parsed.telemetry.flush_threshold,
            config.telemetry.flush_threshold
        );
    }

    #[test]
    fn zero_threshold_rejected() {
        let mut config = AppConfig::default();
        config.telemetry.flush_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config = AppConfig::default();
        config.telemetry.flush_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_pricing_override_rejected() {
        let mut config = AppConfig::default();
        config.telemetry.custom_pricing.insert(
            "custom-model".into(),
            PricingOverrideConfig {
                input_per_m: -1.0,
                output_per_m: 2.0,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.telemetry.flush_threshold, 10);
    }

    #[test]
    fn telemetry_section_parsing() {
        let toml_str = r#"
base_url = "https://proxy.internal/v1"

[telemetry]
api_key = "cs_live_xyz"
endpoint = "https://collector.internal/v1/telemetry"
flush_threshold = 25
flush_interval_secs = 10

[telemetry.custom_pricing.in-house-7b]
input_per_m = 0.05
output_per_m = 0.1
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.telemetry.enabled());
        assert_eq!(config.base_url, "https://proxy.internal/v1");
        assert_eq!(config.telemetry.flush_threshold, 25);
        assert_eq!(config.telemetry.flush_interval_secs, 10);
        let override_cfg = &config.telemetry.custom_pricing["in-house-7b"];
        assert!((override_cfg.input_per_m - 0.05).abs() < 1e-10);
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.telemetry.api_key = Some("cs_live_secret".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(!dbg.contains("cs_live_secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
