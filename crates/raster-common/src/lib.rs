//! Common types and utilities shared across the temporal raster workspace.

pub mod attributes;
pub mod bbox;
pub mod crs;
pub mod error;
pub mod time;

pub use attributes::{AttributeValue, Attributes};
pub use bbox::Extent;
pub use crs::Crs;
pub use error::{CommonError, CommonResult};
pub use time::TimeRange;
