//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::metadata::DEFAULT_FILE_NAME_DELIMITER;
use crate::partition::MAX_BATCH_SIZE;
use crate::record::RecordVariant;

/// How CSV rows are turned into records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Source token meaning "not applicable / suppressed".
    pub sentinel_token: String,
    /// Number the sentinel token is replaced with.
    pub sentinel_value: f64,
    /// CSV field delimiter (single ASCII character).
    pub delimiter: char,
    /// Separator between identifier segments in source file names.
    pub file_name_delimiter: char,
    /// Record shape to produce.
    pub variant: RecordVariant,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            sentinel_token: "..".into(),
            sentinel_value: -1.0,
            delimiter: ',',
            file_name_delimiter: DEFAULT_FILE_NAME_DELIMITER,
            variant: RecordVariant::GeoStratified,
        }
    }
}

impl TransformConfig {
    /// The CSV delimiter as a byte, if it is ASCII.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(ConfigError::Invalid {
                field: "transform.delimiter".into(),
                reason: format!("'{}' is not an ASCII character", self.delimiter),
            })
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub transform: TransformConfig,
    /// Write requests per store call (at most 25).
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transform: TransformConfig::default(),
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Parse a YAML (or JSON) document.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a YAML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid {
                field: "batch_size".into(),
                reason: format!("must be between 1 and {MAX_BATCH_SIZE}, got {}", self.batch_size),
            });
        }
        self.transform.delimiter_byte()?;
        if self.transform.sentinel_token.is_empty() {
            return Err(ConfigError::Invalid {
                field: "transform.sentinel_token".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.batch_size, 25);
        assert_eq!(cfg.transform.sentinel_token, "..");
        assert_eq!(cfg.transform.sentinel_value, -1.0);
        assert_eq!(cfg.transform.variant, RecordVariant::GeoStratified);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = PipelineConfig::from_yaml_str(
            "batch_size: 10\ntransform:\n  variant: single\n  sentinel_token: \"n/a\"\n",
        )
        .unwrap();
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.transform.variant, RecordVariant::Single);
        assert_eq!(cfg.transform.sentinel_token, "n/a");
        assert_eq!(cfg.transform.delimiter, ',');
    }

    #[test]
    fn json_is_accepted() {
        let cfg = PipelineConfig::from_yaml_str(r#"{"batch_size": 5}"#).unwrap();
        assert_eq!(cfg.batch_size, 5);
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let err = PipelineConfig::from_yaml_str("batch_size: 26").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.transform.delimiter = '§';
        assert!(cfg.validate().is_err());
    }
}
