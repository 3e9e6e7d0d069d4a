use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline settings. Every field has a default, so a config file only needs
/// the keys it changes.
///
/// # Examples
/// ```
/// use usbtrace_core::AnalyzerConfig;
///
/// let config = AnalyzerConfig::from_json_str(r#"{ "filter_sofs": true }"#).unwrap();
/// assert!(config.filter_sofs);
/// assert!(config.collate_transfers);
/// assert_eq!(config.poll_timeout_ms, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Merge consecutive full-size transactions into one transfer.
    pub collate_transfers: bool,
    /// Fold runs of start-of-frame markers into one collection packet.
    pub conglomerate_sofs: bool,
    /// Drop start-of-frame markers before decoding.
    pub filter_sofs: bool,
    /// How long the driver waits on the capture thread before re-checking
    /// for termination.
    pub poll_timeout_ms: u64,
    /// Packets buffered between the capture thread and the driver.
    pub channel_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            collate_transfers: true,
            conglomerate_sofs: true,
            filter_sofs: false,
            poll_timeout_ms: 100,
            channel_capacity: 1024,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_timeout_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "channel_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        assert_eq!(AnalyzerConfig::from_json_str("{}").unwrap(), AnalyzerConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AnalyzerConfig::from_json_str(r#"{ "colate_transfers": false }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_capacity_is_invalid() {
        let err = AnalyzerConfig::from_json_str(r#"{ "channel_capacity": 0 }"#).unwrap_err();
        assert!(err.to_string().contains("channel_capacity"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = AnalyzerConfig::from_json_file(Path::new("/nonexistent/usbtrace.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/usbtrace.json"));
    }
}
