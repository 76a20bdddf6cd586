//! Configuration module for chronosync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for chronosync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Grace window (seconds) within which an incoming server version does
    /// not override a dirty local edit.
    pub margin_of_error_secs: u64,
    /// Backoff used while the server is unavailable.
    pub retry: RetryConfig,
}

/// Backoff settings for the fast (generic 5xx) and slow (HTTP 500) tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// First delay on the fast track (seconds).
    pub fast_default_secs: u64,
    /// First delay on the slow track (seconds).
    pub slow_default_secs: u64,
    /// Growth factor range of the fast track.
    pub fast_factor: FactorRange,
    /// Growth factor range of the slow track.
    pub slow_factor: FactorRange,
}

/// Half-open range `[min, max)` a random growth factor is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorRange {
    pub min: f64,
    pub max: f64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/chronosync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("chronosync")
            .join("config.yaml")
    }
}

impl SyncConfig {
    /// Grace window as a [`Duration`].
    pub fn margin_of_error(&self) -> Duration {
        Duration::from_secs(self.margin_of_error_secs)
    }
}

impl RetryConfig {
    /// Validates the backoff settings, reporting every invalid field
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.fast_default_secs == 0 {
            errors.push(ValidationError {
                field: "sync.retry.fast_default_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.slow_default_secs == 0 {
            errors.push(ValidationError {
                field: "sync.retry.slow_default_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        validate_factor(&mut errors, "sync.retry.fast_factor", self.fast_factor);
        validate_factor(&mut errors, "sync.retry.slow_factor", self.slow_factor);
        errors
    }

    pub fn fast_default(&self) -> Duration {
        Duration::from_secs(self.fast_default_secs)
    }

    pub fn slow_default(&self) -> Duration {
        Duration::from_secs(self.slow_default_secs)
    }
}

impl FactorRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            margin_of_error_secs: 5,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            fast_default_secs: 10,
            slow_default_secs: 60,
            fast_factor: FactorRange::new(1.0, 1.5),
            slow_factor: FactorRange::new(1.5, 2.0),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.retry.fast_default_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync.retry ---
        errors.extend(self.sync.retry.validate());

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

fn validate_factor(errors: &mut Vec<ValidationError>, field: &str, range: FactorRange) {
    if !range.min.is_finite() || !range.max.is_finite() {
        errors.push(ValidationError {
            field: field.into(),
            message: "bounds must be finite".into(),
        });
        return;
    }
    if range.min < 1.0 {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("min ({}) must be at least 1.0", range.min),
        });
    }
    if range.max <= range.min {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("max ({}) must be greater than min ({})", range.max, range.min),
        });
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use chronosync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .sync_margin_of_error_secs(0)
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.sync.margin_of_error_secs, 0);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_margin_of_error_secs(mut self, seconds: u64) -> Self {
        self.config.sync.margin_of_error_secs = seconds;
        self
    }

    pub fn retry_fast_default_secs(mut self, seconds: u64) -> Self {
        self.config.sync.retry.fast_default_secs = seconds;
        self
    }

    pub fn retry_slow_default_secs(mut self, seconds: u64) -> Self {
        self.config.sync.retry.slow_default_secs = seconds;
        self
    }

    pub fn retry_fast_factor(mut self, min: f64, max: f64) -> Self {
        self.config.sync.retry.fast_factor = FactorRange::new(min, max);
        self
    }

    pub fn retry_slow_factor(mut self, min: f64, max: f64) -> Self {
        self.config.sync.retry.slow_factor = FactorRange::new(min, max);
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.margin_of_error_secs, 5);
        assert_eq!(cfg.sync.margin_of_error(), Duration::from_secs(5));
        assert_eq!(cfg.sync.retry.fast_default(), Duration::from_secs(10));
        assert_eq!(cfg.sync.retry.slow_default(), Duration::from_secs(60));
        assert_eq!(cfg.sync.retry.fast_factor, FactorRange::new(1.0, 1.5));
        assert_eq!(cfg.sync.retry.slow_factor, FactorRange::new(1.5, 2.0));
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
sync:
  margin_of_error_secs: 3
  retry:
    fast_default_secs: 5
    slow_default_secs: 30
    fast_factor: { min: 1.0, max: 1.2 }
    slow_factor: { min: 2.0, max: 3.0 }
logging:
  level: debug
  json: true
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.margin_of_error_secs, 3);
        assert_eq!(cfg.sync.retry.fast_default_secs, 5);
        assert_eq!(cfg.sync.retry.slow_default_secs, 30);
        assert_eq!(cfg.sync.retry.fast_factor, FactorRange::new(1.0, 1.2));
        assert_eq!(cfg.sync.retry.slow_factor, FactorRange::new(2.0, 3.0));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"logging:\n  level: warn\n").unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.sync, SyncConfig::default());
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("chronosync/config.yaml"));
    }

    // -- Validation --

    #[test]
    fn validate_rejects_zero_defaults() {
        let errors = ConfigBuilder::new()
            .retry_fast_default_secs(0)
            .retry_slow_default_secs(0)
            .build()
            .validate();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"sync.retry.fast_default_secs"));
        assert!(fields.contains(&"sync.retry.slow_default_secs"));
    }

    #[test]
    fn validate_rejects_shrinking_or_empty_factor_ranges() {
        let errors = ConfigBuilder::new()
            .retry_fast_factor(0.5, 1.5)
            .retry_slow_factor(2.0, 2.0)
            .build()
            .validate();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "sync.retry.fast_factor");
        assert_eq!(errors[1].field, "sync.retry.slow_factor");
    }

    #[test]
    fn retry_validate_rejects_infinite_factor_bound() {
        let retry = RetryConfig {
            slow_factor: FactorRange::new(1.5, f64::INFINITY),
            ..RetryConfig::default()
        };
        let errors = retry.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "sync.retry.slow_factor: bounds must be finite");
    }

    #[test]
    fn validate_rejects_unknown_log_level() {
        let result = ConfigBuilder::new().logging_level("verbose").build_validated();
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "logging.level");
        assert!(errors[0].to_string().contains("verbose"));
    }

    #[test]
    fn zero_margin_of_error_is_valid() {
        assert!(ConfigBuilder::new()
            .sync_margin_of_error_secs(0)
            .build_validated()
            .is_ok());
    }
}
