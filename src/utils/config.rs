use crate::core::ARRIVAL_THRESHOLD_METERS;
use crate::reporting::http::is_http_url;
use crate::session::ReportDispatch;
use crate::source::WatchOptions;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable overriding the arrival threshold
pub const ENV_ARRIVAL_THRESHOLD: &str = "PROXIMITY_ARRIVAL_THRESHOLD_M";
/// Environment variable overriding the progress endpoint
pub const ENV_PROGRESS_ENDPOINT: &str = "PROXIMITY_PROGRESS_ENDPOINT";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "PROXIMITY_LOG_LEVEL";

/// Largest geofence radius accepted (meters)
const MAX_ARRIVAL_THRESHOLD_M: f64 = 10_000.0;

/// Tracker configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Distance below which the user counts as arrived (meters)
    pub arrival_threshold_m: f64,
    /// Cadence requested from the position source
    pub watch: WatchOptions,
    /// How the one-time progress call is issued
    pub report_dispatch: ReportDispatch,
    /// REST endpoint recording progress; `None` means no HTTP reporter
    pub progress_endpoint: Option<String>,
    /// Timeout of the progress call (milliseconds)
    pub report_timeout_ms: u64,
    pub log_level: LogLevel,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            arrival_threshold_m: ARRIVAL_THRESHOLD_METERS,
            watch: WatchOptions::default(),
            report_dispatch: ReportDispatch::Background,
            progress_endpoint: None,
            report_timeout_ms: 10_000,
            log_level: LogLevel::Info,
        }
    }
}

/// Logging levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive usable as a tracing filter
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(ConfigError::InvalidParameter {
                parameter: "log_level".to_string(),
                value: other.to_string(),
                reason: "expected one of error, warn, info, debug, trace".to_string(),
            }),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    #[error("config file I/O error: {message}")]
    IoError { message: String },
    #[error("config serialization error: {message}")]
    SerializationError { message: String },
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error, if any, as a `Result`
    pub fn into_result(self) -> Result<(), ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a JSON file and validate it
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: TrackerConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
                message: format!("Failed to parse config file '{}': {}", path_str, e),
            })?;

        let validation = config.validate();
        for warning in &validation.warnings {
            warn!("{}: {}", path_str, warning);
        }
        validation.into_result()?;

        info!(path = %path_str, "loaded tracker configuration");
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializationError {
                message: format!("Failed to serialize config: {}", e),
            })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    /// Apply `PROXIMITY_*` environment overrides; invalid values are ignored
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(ENV_ARRIVAL_THRESHOLD) {
            match raw.trim().parse::<f64>() {
                Ok(threshold) => {
                    if let Err(e) = self.set_arrival_threshold(threshold) {
                        warn!("Ignoring {ENV_ARRIVAL_THRESHOLD}: {e}");
                    }
                }
                Err(e) => warn!("Invalid {ENV_ARRIVAL_THRESHOLD} value '{raw}': {e}"),
            }
        }

        if let Some(endpoint) = lookup(ENV_PROGRESS_ENDPOINT) {
            if is_http_url(&endpoint) {
                self.progress_endpoint = Some(endpoint);
            } else {
                warn!("Ignoring {ENV_PROGRESS_ENDPOINT}: '{endpoint}' is not an http(s) URL");
            }
        }

        if let Some(raw) = lookup(ENV_LOG_LEVEL) {
            match raw.parse::<LogLevel>() {
                Ok(level) => self.log_level = level,
                Err(e) => warn!("Ignoring {ENV_LOG_LEVEL}: {e}"),
            }
        }
    }

    /// Update the arrival threshold, returning the previous value
    pub fn set_arrival_threshold(&mut self, threshold_m: f64) -> Result<f64, ConfigError> {
        check_threshold(threshold_m)?;
        let old_value = self.arrival_threshold_m;
        self.arrival_threshold_m = threshold_m;
        Ok(old_value)
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if let Err(e) = check_threshold(self.arrival_threshold_m) {
            result.errors.push(e);
        }

        if !self.watch.distance_interval_m.is_finite() || self.watch.distance_interval_m < 0.0 {
            result.errors.push(ConfigError::InvalidParameter {
                parameter: "watch.distance_interval_m".to_string(),
                value: self.watch.distance_interval_m.to_string(),
                reason: "Distance interval must be a non-negative number".to_string(),
            });
        } else if self.watch.distance_interval_m >= self.arrival_threshold_m {
            result.warnings.push(format!(
                "Distance interval {}m is not below the arrival threshold {}m; arrival may be stepped over",
                self.watch.distance_interval_m, self.arrival_threshold_m
            ));
        }

        if self.report_timeout_ms == 0 {
            result.errors.push(ConfigError::InvalidParameter {
                parameter: "report_timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "Report timeout must be positive".to_string(),
            });
        }

        if let Some(endpoint) = &self.progress_endpoint {
            if !is_http_url(endpoint) {
                result.errors.push(ConfigError::InvalidParameter {
                    parameter: "progress_endpoint".to_string(),
                    value: endpoint.clone(),
                    reason: "Endpoint must be an http or https URL".to_string(),
                });
            }
        }

        result
    }
}

fn check_threshold(threshold_m: f64) -> Result<(), ConfigError> {
    if !threshold_m.is_finite() || threshold_m <= 0.0 {
        return Err(ConfigError::InvalidParameter {
            parameter: "arrival_threshold_m".to_string(),
            value: threshold_m.to_string(),
            reason: "Arrival threshold must be positive".to_string(),
        });
    }

    if threshold_m > MAX_ARRIVAL_THRESHOLD_M {
        return Err(ConfigError::InvalidParameter {
            parameter: "arrival_threshold_m".to_string(),
            value: threshold_m.to_string(),
            reason: format!("Arrival threshold above {}m is not a geofence", MAX_ARRIVAL_THRESHOLD_M),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.arrival_threshold_m, 30.0);
        assert_eq!(config.report_dispatch, ReportDispatch::Background);
        assert!(config.progress_endpoint.is_none());
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_threshold_adjustment() {
        let mut config = TrackerConfig::default();
        assert_eq!(config.set_arrival_threshold(50.0), Ok(30.0));
        assert_eq!(config.arrival_threshold_m, 50.0);

        assert!(config.set_arrival_threshold(0.0).is_err());
        assert!(config.set_arrival_threshold(-5.0).is_err());
        assert!(config.set_arrival_threshold(f64::NAN).is_err());
        assert!(config.set_arrival_threshold(20_000.0).is_err());
        assert_eq!(config.arrival_threshold_m, 50.0);
    }

    #[test]
    fn test_validation_errors_and_warnings() {
        let mut config = TrackerConfig::default();
        config.arrival_threshold_m = 0.0;
        config.progress_endpoint = Some("mailto:someone".to_string());
        config.report_timeout_ms = 0;
        let result = config.validate();
        assert_eq!(result.errors.len(), 3);

        let mut config = TrackerConfig::default();
        config.watch.distance_interval_m = 40.0;
        let result = config.validate();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracker.json");

        let mut config = TrackerConfig::default();
        config.arrival_threshold_m = 45.0;
        config.report_dispatch = ReportDispatch::Inline;
        config.progress_endpoint = Some("https://api.example.com/progress.php".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = TrackerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracker.json");
        fs::write(&path, r#"{"arrival_threshold_m": 12.5}"#).unwrap();

        let loaded = TrackerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.arrival_threshold_m, 12.5);
        assert_eq!(loaded.watch, WatchOptions::default());
    }

    #[test]
    fn test_invalid_config_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracker.json");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            TrackerConfig::load_from_file(&path),
            Err(ConfigError::SerializationError { .. })
        ));

        fs::write(&path, r#"{"arrival_threshold_m": -1.0}"#).unwrap();
        assert!(matches!(
            TrackerConfig::load_from_file(&path),
            Err(ConfigError::InvalidParameter { .. })
        ));

        assert!(matches!(
            TrackerConfig::load_from_file(dir.path().join("missing.json")),
            Err(ConfigError::IoError { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_ARRIVAL_THRESHOLD, "25"),
            (ENV_PROGRESS_ENDPOINT, "http://localhost:8080/progress"),
            (ENV_LOG_LEVEL, "DEBUG"),
        ]
        .into_iter()
        .collect();

        let mut config = TrackerConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.arrival_threshold_m, 25.0);
        assert_eq!(config.progress_endpoint.as_deref(), Some("http://localhost:8080/progress"));
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let vars: HashMap<&str, &str> = [
            (ENV_ARRIVAL_THRESHOLD, "far"),
            (ENV_PROGRESS_ENDPOINT, "not a url"),
            (ENV_LOG_LEVEL, "loud"),
        ]
        .into_iter()
        .collect();

        let mut config = TrackerConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config, TrackerConfig::default());
    }
}
