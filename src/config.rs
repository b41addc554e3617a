//! Engine configuration.
//!
//! Thresholds and margins are empirically chosen constants carried as
//! configuration. Validation is fail-fast: a bad config is rejected at
//! startup, before any evidence item is processed.

use crate::scoring::ConfidenceThresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the linking engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Confidence bucket thresholds.
    pub thresholds: ConfidenceThresholds,
    /// Replace-if-better margin: an existing link is only overwritten by the
    /// same algorithm when the new score exceeds the old by more than this.
    pub replace_margin: f64,
    /// Cosine-similarity floor for the embedding scorer.
    pub embedding_floor: f64,
    /// Fixed delay between items when the configured scorer is remote.
    pub inter_call_delay_ms: u64,
    /// Retry attempts for transient external failures.
    pub max_retries: u32,
    /// Base backoff between retries (grows linearly per attempt).
    pub retry_backoff_ms: u64,
    /// Cap on candidate promises fetched per run scope.
    pub candidate_limit: Option<usize>,
    /// Cap on pending evidence items processed per run.
    pub batch_limit: Option<usize>,
    /// Optional YAML department-alias table replacing the built-in one.
    pub department_aliases: Option<PathBuf>,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            thresholds: ConfidenceThresholds::default(),
            replace_margin: 0.05,
            embedding_floor: 0.4,
            inter_call_delay_ms: 500,
            max_retries: 3,
            retry_backoff_ms: 250,
            candidate_limit: None,
            batch_limit: None,
            department_aliases: None,
        }
    }
}

impl LinkerConfig {
    /// Load a config from YAML, falling back to defaults for absent fields,
    /// and validate it.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: LinkerConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail-fast validation, run before any item is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate().map_err(ConfigError::Invalid)?;
        if self.replace_margin < 0.0 || self.replace_margin > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "replace_margin must be in [0, 1], got {}",
                self.replace_margin
            )));
        }
        if self.embedding_floor < 0.0 || self.embedding_floor > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "embedding_floor must be in [0, 1], got {}",
                self.embedding_floor
            )));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if let Some(path) = &self.department_aliases {
            if !path.exists() {
                return Err(ConfigError::Invalid(format!(
                    "department alias table not found: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(LinkerConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_yaml_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "replace_margin: 0.1\nthresholds:\n  high: 0.5").unwrap();

        let config = LinkerConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.replace_margin, 0.1);
        assert_eq!(config.thresholds.high, 0.5);
        // Untouched fields keep their defaults.
        assert_eq!(config.thresholds.low, 0.10);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn missing_alias_table_fails_fast() {
        let config = LinkerConfig {
            department_aliases: Some(PathBuf::from("/nonexistent/aliases.yaml")),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn out_of_range_margin_is_rejected() {
        let config = LinkerConfig {
            replace_margin: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unordered_thresholds_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "thresholds:\n  high: 0.05\n  medium: 0.15\n  low: 0.10").unwrap();
        assert!(matches!(
            LinkerConfig::from_yaml_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
