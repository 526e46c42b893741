//! Error types for the censuskv pipeline.

use thiserror::Error;

/// Errors raised while reading or validating input data.
///
/// Every variant is fatal: the run stops and no partial output is treated
/// as valid.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input has no header row")]
    MissingHeader,

    #[error("Duplicate header field '{field}' at column {column}")]
    DuplicateField { field: String, column: usize },

    #[error("Row {row}: expected {expected} values, got {got}")]
    RowLength {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("Row {row}, column '{column}': value '{value}' is not numeric")]
    NonNumeric {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Row {row}: region identifier is empty")]
    EmptyRegionId { row: usize },

    #[error("File name '{name}' does not follow the naming convention: {reason}")]
    FileNaming { name: String, reason: String },

    #[error("Record is missing key attribute '{attribute}'")]
    MissingKey { attribute: String },
}

impl InputError {
    /// Returns `true` if the error came from the underlying reader or file
    /// system rather than from the data itself.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Errors returned by a key-value store backend.
///
/// Variants mirror the error categories of managed key-value stores so the
/// operator can tell throttling apart from a missing table or a bad request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("ProvisionedThroughputExceededException: {0}")]
    ProvisionedThroughputExceeded(String),

    #[error("ResourceNotFoundException: {0}")]
    ResourceNotFound(String),

    #[error("ResourceInUseException: {0}")]
    ResourceInUse(String),

    #[error("ItemCollectionSizeLimitExceededException: {0}")]
    ItemCollectionSizeLimitExceeded(String),

    #[error("RequestLimitExceeded: {0}")]
    RequestLimitExceeded(String),

    #[error("InternalServerError: {0}")]
    InternalServerError(String),

    #[error("ValidationException: {0}")]
    Validation(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Stable error category code, as reported to the operator.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProvisionedThroughputExceeded(_) => "ProvisionedThroughputExceededException",
            Self::ResourceNotFound(_) => "ResourceNotFoundException",
            Self::ResourceInUse(_) => "ResourceInUseException",
            Self::ItemCollectionSizeLimitExceeded(_) => "ItemCollectionSizeLimitExceededException",
            Self::RequestLimitExceeded(_) => "RequestLimitExceeded",
            Self::InternalServerError(_) => "InternalServerError",
            Self::Validation(_) => "ValidationException",
            Self::Other(_) => "Unknown",
        }
    }

    /// The message attached to the error, without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::ProvisionedThroughputExceeded(m)
            | Self::ResourceNotFound(m)
            | Self::ResourceInUse(m)
            | Self::ItemCollectionSizeLimitExceeded(m)
            | Self::RequestLimitExceeded(m)
            | Self::InternalServerError(m)
            | Self::Validation(m)
            | Self::Other(m) => m,
        }
    }

    /// Returns `true` if the error is transient by nature.
    ///
    /// Nothing in censuskv retries; the flag only helps the operator decide
    /// whether re-running the affected batch is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProvisionedThroughputExceeded(_)
                | Self::ItemCollectionSizeLimitExceeded(_)
                | Self::RequestLimitExceeded(_)
                | Self::InternalServerError(_)
        )
    }

    /// Returns `true` if the target table does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound(_))
    }
}

/// Errors raised while partitioning records into write groups.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Invalid batch size {size}: must be between 1 and {max}")]
    InvalidBatchSize { size: usize, max: usize },

    #[error("Record {index} could not be marshaled: {source}")]
    ItemFailed {
        index: usize,
        #[source]
        source: InputError,
    },
}

/// Errors loading or validating pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_codes_and_retryability() {
        let throttled = StoreError::ProvisionedThroughputExceeded("slow down".into());
        assert_eq!(throttled.code(), "ProvisionedThroughputExceededException");
        assert_eq!(throttled.message(), "slow down");
        assert!(throttled.is_retryable());

        let missing = StoreError::ResourceNotFound("no table".into());
        assert!(!missing.is_retryable());
        assert!(missing.is_not_found());

        assert!(!StoreError::Validation("bad".into()).is_retryable());
        assert!(StoreError::InternalServerError("boom".into()).is_retryable());
    }

    #[test]
    fn store_error_display_includes_category() {
        let err = StoreError::Validation("key missing".into());
        assert_eq!(err.to_string(), "ValidationException: key missing");
    }

    #[test]
    fn batch_error_keeps_source() {
        let err = BatchError::ItemFailed {
            index: 3,
            source: InputError::MissingKey {
                attribute: "RegionID".into(),
            },
        };
        assert!(err.to_string().contains("Record 3"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
