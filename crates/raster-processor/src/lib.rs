//! Temporal Raster Collection Processing
//!
//! This crate processes time-ordered stacks of remote-sensing scenes over a
//! region. It provides:
//!
//! - **Collections**: ordered scene records with a shared attribute schema,
//!   filtering, sorting and skip-and-continue per-record transforms
//! - **Masking**: QA bit and classification band decoding into validity flags
//! - **Compositing**: per-pixel temporal median/mean with grid reconciliation
//! - **Region labeling**: 8-connected component labeling with area metrics
//! - **Cubes**: co-registered rasters stacked along a named dimension
//!
//! # Architecture
//!
//! ```text
//! SceneCatalog::search(query)            (metadata only)
//!      │
//!      ▼
//! RasterCollection::from_catalog ──► resolve_collection(resolver)
//!      │                                   │ bounded concurrency,
//!      │                                   │ per-record timeout
//!      ▼                                   ▼
//! filter_by_time / sort_by ──► map(QaMasker | NormalizedDifference | ...)
//!                                          │
//!                 ┌────────────────────────┴──────────────┐
//!                 ▼                                       ▼
//!        group_by_year ──► Compositor            CubeBuilder::build
//!                              │                          │
//!                              ▼                          ▼
//!                  threshold ──► RegionLabeler    MultidimensionalCube
//!                              │
//!                              ▼
//!                  LabeledRegions::area(label, pixel_size)
//! ```
//!
//! Every operation takes immutable inputs and returns new values. Per-record
//! failures inside collection-wide operations drop the record and surface as
//! [`CollectionWarning`]s; precondition violations in reductions, alignment
//! checks and cube assembly fail the call.
//!
//! # Example
//!
//! ```ignore
//! use raster_processor::{
//!     CompositeConfig, ExtentPolicy, QaMaskConfig, QaMasker, RasterCollection,
//! };
//!
//! let masker = QaMasker::new(QaMaskConfig::landsat_c2_cloud())?;
//! let masked = collection.map(&masker);
//! for warning in masked.warnings() {
//!     eprintln!("{}", warning);
//! }
//! let composite = masked.composite(CompositeConfig::median(true, ExtentPolicy::Intersection))?;
//! ```

pub mod band_math;
pub mod catalog;
pub mod collection;
pub mod composite;
pub mod config;
pub mod cube;
pub mod error;
pub mod label;
pub mod mask;
pub mod raster;
pub mod resolve;
pub mod scene;
pub mod templates;
pub mod types;

// Re-export commonly used types at crate root
pub use band_math::{
    combine_bands, map_band, normalized_difference, threshold, NormalizedDifference, Threshold,
};
pub use catalog::{
    AttributeProjection, CatalogQuery, FilterOp, InMemoryCatalog, PropertyFilter, SceneCatalog,
};
pub use collection::{CollectionWarning, Identity, RasterCollection, SceneTransform, TransformOutput};
pub use composite::{CompositeRaster, Compositor};
pub use config::{
    ClassMaskConfig, CompositeConfig, NormalizedDifferenceConfig, ProcessorConfig, QaMaskConfig,
    ThresholdConfig,
};
pub use cube::{CubeBuilder, DimensionOrdering, MultidimensionalCube};
pub use error::{RasterProcessorError, Result};
pub use label::{LabeledRegions, RegionLabeler};
pub use mask::{decode_class_flags, decode_qa_flags, ClassMasker, QaMasker};
pub use raster::{Band, Raster};
pub use resolve::{resolve_collection, resolve_collection_with, RasterResolver, StaticResolver};
pub use scene::{SceneRecord, ScenePayload};
pub use templates::{find_template, ProcessingTemplate};
pub use types::{BandOp, ExtentPolicy, PixelSize, Reduction};

pub use raster_common::{AttributeValue, Attributes, Crs, Extent, TimeRange};
