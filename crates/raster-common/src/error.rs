//! Error types for the shared value types.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

/// Parse and validation failures for extents, CRS identifiers and times.
#[derive(Debug, Clone, Error)]
pub enum CommonError {
    #[error("Invalid extent: {0}")]
    InvalidExtent(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),
}
