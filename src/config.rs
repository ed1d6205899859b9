//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub warehouse: WarehouseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pipeline and local adapter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    #[serde(default = "default_embedded_fallback")]
    pub embedded_fallback: bool,

    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,
}

fn default_query_timeout() -> u64 {
    30
}

fn default_embedded_fallback() -> bool {
    true
}

fn default_csv_delimiter() -> char {
    ','
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: default_query_timeout(),
            embedded_fallback: default_embedded_fallback(),
            csv_delimiter: default_csv_delimiter(),
        }
    }
}

/// Warehouse connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default = "default_warehouse_url")]
    pub base_url: String,

    #[serde(default = "default_row_limit")]
    pub row_limit: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_warehouse_url() -> String {
    "https://bigquery.googleapis.com/bigquery/v2".to_string()
}

fn default_row_limit() -> usize {
    1000
}

fn default_request_timeout() -> u64 {
    30_000
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            base_url: default_warehouse_url(),
            row_limit: default_row_limit(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("chartwise").join("config.toml")),
            Some(PathBuf::from("/etc/chartwise/config.toml")),
            Some(PathBuf::from("./chartwise.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply `CHARTWISE_*` environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; unparsable values are ignored
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Engine overrides
        if let Some(secs) = lookup("CHARTWISE_QUERY_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.engine.query_timeout_secs = secs;
        }
        if let Some(fallback) = lookup("CHARTWISE_EMBEDDED_FALLBACK").and_then(|v| v.parse().ok()) {
            self.engine.embedded_fallback = fallback;
        }
        if let Some(delimiter) = lookup("CHARTWISE_CSV_DELIMITER").and_then(|v| v.chars().next()) {
            self.engine.csv_delimiter = delimiter;
        }

        // Warehouse overrides
        if let Some(url) = lookup("CHARTWISE_WAREHOUSE_URL") {
            self.warehouse.base_url = url;
        }
        if let Some(limit) = lookup("CHARTWISE_WAREHOUSE_ROW_LIMIT").and_then(|v| v.parse().ok()) {
            self.warehouse.row_limit = limit;
        }
        if let Some(ms) = lookup("CHARTWISE_WAREHOUSE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.warehouse.request_timeout_ms = ms;
        }

        // Logging overrides
        if let Some(level) = lookup("CHARTWISE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("CHARTWISE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Chartwise Configuration
#
# Environment variables override these settings:
# - CHARTWISE_QUERY_TIMEOUT_SECS
# - CHARTWISE_EMBEDDED_FALLBACK
# - CHARTWISE_CSV_DELIMITER
# - CHARTWISE_WAREHOUSE_URL
# - CHARTWISE_WAREHOUSE_ROW_LIMIT
# - CHARTWISE_WAREHOUSE_TIMEOUT_MS
# - CHARTWISE_LOG_LEVEL
# - CHARTWISE_LOG_FORMAT

[engine]
# Abort a query that runs longer than this (seconds)
query_timeout_secs = 30

# Return a sample row count instead of an error when the embedded SQL engine fails
embedded_fallback = true

# Delimiter of CSV sources
csv_delimiter = ","

[warehouse]
# BigQuery REST API root
base_url = "https://bigquery.googleapis.com/bigquery/v2"

# Maximum number of result rows
row_limit = 1000

# HTTP request timeout (ms)
request_timeout_ms = 30000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/chartwise/chartwise.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_generated_config_matches_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        let defaults = Config::default();

        assert_eq!(config.engine.query_timeout_secs, defaults.engine.query_timeout_secs);
        assert_eq!(config.engine.embedded_fallback, defaults.engine.embedded_fallback);
        assert_eq!(config.engine.csv_delimiter, ',');
        assert_eq!(config.warehouse.base_url, defaults.warehouse.base_url);
        assert_eq!(config.warehouse.row_limit, 1000);
        assert_eq!(config.warehouse.request_timeout_ms, 30_000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[warehouse]\nrow_limit = 50\n\n[engine]\ncsv_delimiter = \";\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.warehouse.row_limit, 50);
        assert_eq!(config.engine.csv_delimiter, ';');
        assert_eq!(config.engine.query_timeout_secs, 30);
        assert!(config.engine.embedded_fallback);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nquery_timeout_secs = \"soon\"").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(Config::load(Path::new("/nonexistent/chartwise.toml")).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CHARTWISE_QUERY_TIMEOUT_SECS", "5"),
            ("CHARTWISE_EMBEDDED_FALLBACK", "false"),
            ("CHARTWISE_WAREHOUSE_ROW_LIMIT", "not-a-number"),
            ("CHARTWISE_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.engine.query_timeout_secs, 5);
        assert!(!config.engine.embedded_fallback);
        assert_eq!(config.warehouse.row_limit, 1000);
        assert_eq!(config.logging.format, "json");
    }
}
