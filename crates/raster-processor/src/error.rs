//! Error types for raster processing.

use raster_common::CommonError;
use thiserror::Error;

/// Errors that can occur during raster processing.
#[derive(Error, Debug, Clone)]
pub enum RasterProcessorError {
    /// A referenced attribute is absent from the collection schema.
    #[error("attribute '{field}' is not part of the collection schema")]
    Schema { field: String },

    /// Spatially mismatched inputs to a pixel-wise operation.
    #[error("alignment error: {0}")]
    Alignment(String),

    /// A reduction was asked to run over zero contributing records.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A cube slice does not match the grid of the first slice.
    #[error("slice for {dimension_value} does not match cube grid: expected {expected}, found {found}")]
    ShapeMismatch {
        dimension_value: String,
        expected: String,
        found: String,
    },

    /// Cube assembly was given no slices.
    #[error("cannot build a cube from zero slices")]
    EmptyCube,

    /// The same dimension value was supplied twice.
    #[error("duplicate dimension value: {0}")]
    DuplicateDimensionValue(String),

    /// Dimension values declared sorted are not strictly increasing.
    #[error("dimension values are not strictly increasing at {0}")]
    UnorderedDimension(String),

    /// Two records in one collection share an id.
    #[error("duplicate record id: {0}")]
    DuplicateRecordId(String),

    /// A per-record transform or predicate failed.
    #[error("transform failed for record {record_id}: {message}")]
    Transform { record_id: String, message: String },

    /// Fetching the pixel payload of a record failed.
    #[error("failed to resolve raster for record {record_id}: {message}")]
    Resolution { record_id: String, message: String },

    /// Fetching the pixel payload of a record exceeded its deadline.
    #[error("resolving raster for record {record_id} timed out after {seconds}s")]
    Timeout { record_id: String, seconds: u64 },

    /// A pixel operation needs a payload that was never resolved.
    #[error("record {0} has no resolved raster")]
    Unresolved(String),

    /// A named band does not exist or cannot be used.
    #[error("invalid band: {0}")]
    InvalidBand(String),

    /// A raster violates its own structural invariants.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// Catalog collaborator failure.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Shared value type error (extent, CRS, time parsing).
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl RasterProcessorError {
    /// Create a Schema error.
    pub fn schema(field: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
        }
    }

    /// Create an Alignment error.
    pub fn alignment(msg: impl Into<String>) -> Self {
        Self::Alignment(msg.into())
    }

    /// Create an InsufficientData error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    /// Create a Transform error tagged with the failing record.
    pub fn transform(record_id: impl Into<String>, msg: impl std::fmt::Display) -> Self {
        Self::Transform {
            record_id: record_id.into(),
            message: msg.to_string(),
        }
    }

    /// Create a Resolution error tagged with the failing record.
    pub fn resolution(record_id: impl Into<String>, msg: impl std::fmt::Display) -> Self {
        Self::Resolution {
            record_id: record_id.into(),
            message: msg.to_string(),
        }
    }

    /// Create an InvalidBand error.
    pub fn invalid_band(msg: impl Into<String>) -> Self {
        Self::InvalidBand(msg.into())
    }

    /// Create an InvalidRaster error.
    pub fn invalid_raster(msg: impl Into<String>) -> Self {
        Self::InvalidRaster(msg.into())
    }

    /// Whether this error is a per-record fault that collection-wide
    /// operations recover from by dropping the record.
    pub fn is_record_local(&self) -> bool {
        matches!(
            self,
            Self::Transform { .. }
                | Self::Resolution { .. }
                | Self::Timeout { .. }
                | Self::Unresolved(_)
        )
    }
}

impl From<serde_json::Error> for RasterProcessorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Catalog(err.to_string())
    }
}

/// Result type for raster processor operations.
pub type Result<T> = std::result::Result<T, RasterProcessorError>;
