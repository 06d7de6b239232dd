//! Static configuration
//!
//! The services list (name + dependencies) plus the operational knobs
//! the engines consume. Loaded from YAML, either an explicit path or the
//! `CAUSEWAY_CONFIG` environment variable; every field except the
//! services list has a default.

use causeway_analysis::ServiceConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default index prefix for logs and findings
pub const DEFAULT_INDEX_PREFIX: &str = "app-logs";

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "CAUSEWAY_CONFIG";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse failed: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("CAUSEWAY_CONFIG is not set")]
    MissingEnv,
}

/// Monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// The service fleet and its dependency lists
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    /// Index prefix (`<prefix>-logs`, `<prefix>-agent-findings`)
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
    /// Minimum error count for a service to be problematic
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u64,
    /// Width of the correlation window, in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    /// Whether WARN-level events count toward the threshold
    #[serde(default)]
    pub include_warnings: bool,
    /// Trailing days for the historical baseline
    #[serde(default = "default_baseline_days")]
    pub baseline_days: u32,
    /// TTL for cached baseline lookups, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Bounded timeout for store calls, in seconds
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Width of the deployment before/after windows, in minutes
    #[serde(default = "default_deployment_window_minutes")]
    pub deployment_window_minutes: i64,
    /// How far back deployment detection looks, in hours
    #[serde(default = "default_deployment_lookback_hours")]
    pub deployment_lookback_hours: i64,
    /// Agent id recorded on produced findings
    #[serde(default = "default_agent_id")]
    pub agent_id: String,
}

fn default_index_prefix() -> String {
    DEFAULT_INDEX_PREFIX.to_string()
}

fn default_error_threshold() -> u64 {
    causeway_analysis::DEFAULT_ERROR_THRESHOLD
}

fn default_window_minutes() -> i64 {
    15
}

fn default_baseline_days() -> u32 {
    causeway_analysis::DEFAULT_BASELINE_DAYS
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_query_timeout_secs() -> u64 {
    5
}

fn default_deployment_window_minutes() -> i64 {
    causeway_analysis::DEFAULT_IMPACT_WINDOW_MINUTES
}

fn default_deployment_lookback_hours() -> i64 {
    24
}

fn default_agent_id() -> String {
    "auto-monitor".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            index_prefix: default_index_prefix(),
            error_threshold: default_error_threshold(),
            window_minutes: default_window_minutes(),
            include_warnings: false,
            baseline_days: default_baseline_days(),
            cache_ttl_secs: default_cache_ttl_secs(),
            query_timeout_secs: default_query_timeout_secs(),
            deployment_window_minutes: default_deployment_window_minutes(),
            deployment_lookback_hours: default_deployment_lookback_hours(),
            agent_id: default_agent_id(),
        }
    }
}

impl MonitorConfig {
    /// Create the default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a service fleet
    #[must_use]
    pub fn with_services(mut self, services: Vec<ServiceConfig>) -> Self {
        self.services = services;
        self
    }

    /// With an index prefix
    #[must_use]
    pub fn with_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_prefix = prefix.into();
        self
    }

    /// With a problematic threshold
    #[inline]
    #[must_use]
    pub fn with_error_threshold(mut self, threshold: u64) -> Self {
        self.error_threshold = threshold;
        self
    }

    /// With WARN-level events included
    #[inline]
    #[must_use]
    pub fn with_warnings(mut self) -> Self {
        self.include_warnings = true;
        self
    }

    /// Load from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load from the file named by `CAUSEWAY_CONFIG`
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV_VAR).map_err(|_| ConfigError::MissingEnv)?;
        Self::from_yaml_file(path)
    }

    /// Logs index name
    #[must_use]
    pub fn logs_index(&self) -> String {
        format!("{}-logs", self.index_prefix)
    }

    /// Findings index name
    #[must_use]
    pub fn findings_index(&self) -> String {
        causeway_findings::findings_index(&self.index_prefix)
    }

    /// Bounded store-call timeout
    #[inline]
    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Baseline cache TTL
    #[inline]
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = MonitorConfig::new();
        assert_eq!(config.error_threshold, 5);
        assert_eq!(config.window_minutes, 15);
        assert_eq!(config.baseline_days, 7);
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.deployment_window_minutes, 60);
        assert_eq!(config.logs_index(), "app-logs-logs");
        assert_eq!(config.findings_index(), "app-logs-agent-findings");
    }

    #[test]
    fn yaml_with_partial_fields_keeps_defaults() {
        let config = MonitorConfig::from_yaml(
            r#"
index_prefix: fleet
error_threshold: 10
services:
  - name: api-gateway
    dependencies: [auth-service, product-service]
  - name: auth-service
    dependencies: [user-db]
  - name: user-db
"#,
        )
        .unwrap();

        assert_eq!(config.index_prefix, "fleet");
        assert_eq!(config.error_threshold, 10);
        assert_eq!(config.window_minutes, 15);
        assert_eq!(config.services.len(), 3);
        assert_eq!(config.services[0].dependencies.len(), 2);
        assert!(config.services[2].dependencies.is_empty());
    }

    #[test]
    fn yaml_file_loading() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "index_prefix: filetest").unwrap();

        let config = MonitorConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.index_prefix, "filetest");
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let err = MonitorConfig::from_yaml("services: 12").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
