//! Runtime configuration from environment variables
//!
//! Built once per invocation and handed to each component; nothing reads the
//! environment after startup.

use crate::counter::DEFAULT_TTL_SECS;
use crate::emit::DEFAULT_NAMESPACE_PREFIX;
use crate::error::ConfigError;
use crate::window::DEFAULT_WINDOW_SECS;
use std::env;
use std::path::PathBuf;

/// Where emitted metric documents go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsOutput {
    Stdout,
    File(PathBuf),
}

impl MetricsOutput {
    fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "-" | "stdout" => MetricsOutput::Stdout,
            path => MetricsOutput::File(PathBuf::from(path)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EdgeflowConfig {
    /// SQLite file holding the durable counters
    pub db_path: PathBuf,

    /// Counter table name
    pub table_name: String,

    /// Seconds a counter outlives its bucket
    pub counter_ttl_secs: i64,

    /// Width of the trailing aggregation window in seconds
    pub window_secs: i64,

    /// Metric namespaces are `"<prefix> - Count"` and `"<prefix> - Percent"`
    pub namespace_prefix: String,

    pub metrics_output: MetricsOutput,
}

impl Default for EdgeflowConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/edgeflow.db"),
            table_name: "edge_status_counts".to_string(),
            counter_ttl_secs: DEFAULT_TTL_SECS,
            window_secs: DEFAULT_WINDOW_SECS,
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            metrics_output: MetricsOutput::Stdout,
        }
    }
}

impl EdgeflowConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `EDGEFLOW_DB_PATH` (default: data/edgeflow.db)
    /// - `EDGEFLOW_TABLE_NAME` (default: edge_status_counts)
    /// - `EDGEFLOW_COUNTER_TTL_SECS` (default: 900)
    /// - `EDGEFLOW_WINDOW_SECS` (default: 60)
    /// - `EDGEFLOW_NAMESPACE_PREFIX` (default: CloudFront by Edge Location)
    /// - `EDGEFLOW_METRICS_OUTPUT` (default: `-`, stdout)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            db_path: env::var("EDGEFLOW_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),

            table_name: env::var("EDGEFLOW_TABLE_NAME").unwrap_or(defaults.table_name),

            counter_ttl_secs: positive_from_env("EDGEFLOW_COUNTER_TTL_SECS", defaults.counter_ttl_secs)?,

            window_secs: positive_from_env("EDGEFLOW_WINDOW_SECS", defaults.window_secs)?,

            namespace_prefix: env::var("EDGEFLOW_NAMESPACE_PREFIX")
                .unwrap_or(defaults.namespace_prefix),

            metrics_output: env::var("EDGEFLOW_METRICS_OUTPUT")
                .map(|v| MetricsOutput::parse(&v))
                .unwrap_or(defaults.metrics_output),
        };

        validate_identifier("EDGEFLOW_TABLE_NAME", &config.table_name)?;
        Ok(config)
    }
}

fn positive_from_env(name: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => match value.trim().parse::<i64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(ConfigError::InvalidNumber { name, value }),
        },
    }
}

/// Table names are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_identifier(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let mut chars = value.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            name,
            value: value.to_string(),
        })
    }
}
