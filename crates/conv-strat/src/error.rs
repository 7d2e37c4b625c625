//! Error types for convective/stratiform partitioning.

use thiserror::Error;

/// Errors that can occur while configuring or running the partition.
///
/// Missing samples and sparse kernels are not errors: they propagate as
/// missing values through the derived grids.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvStratError {
    /// Grid geometry is malformed (zero dimensions, bad spacing, ...).
    #[error("invalid grid geometry: {0}")]
    InvalidGeometry(String),

    /// A threshold or radius setting is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The input volume does not match the grid geometry.
    #[error("volume has {actual} values, grid expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A partition was requested before any grid geometry was set.
    #[error("grid geometry has not been set")]
    GridNotSet,

    /// Configuration (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ConvStratError {
    /// Create an InvalidGeometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }
}

impl From<serde_json::Error> for ConvStratError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for partition operations.
pub type Result<T> = std::result::Result<T, ConvStratError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConvStratError::dimension_mismatch(100, 99);
        assert_eq!(err.to_string(), "volume has 99 values, grid expects 100");

        let err = ConvStratError::invalid_geometry("nx must be > 0");
        assert_eq!(err.to_string(), "invalid grid geometry: nx must be > 0");
    }

    #[test]
    fn test_from_serde_json() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: ConvStratError = parse.unwrap_err().into();
        assert!(matches!(err, ConvStratError::Serialization(_)));
    }
}
