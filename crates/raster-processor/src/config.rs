//! Configuration for the raster processor.
//!
//! Every per-scene transform takes its parameters from one of these structs
//! rather than from captured state, so the same threshold or bit list is
//! visibly shared between the steps that use it.

use crate::types::{ExtentPolicy, Reduction};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Execution settings shared by collection-wide operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Rows per spatial tile for reductions and labeling.
    pub tile_rows: usize,

    /// Run per-record transforms and per-tile work on the rayon pool.
    pub parallel: bool,

    /// Deadline for resolving one record's raster payload, in seconds.
    pub resolve_timeout_secs: u64,

    /// Maximum number of payload resolutions in flight.
    pub resolve_concurrency: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            tile_rows: 256,
            parallel: true,
            resolve_timeout_secs: 30,
            resolve_concurrency: 8,
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RASTER_TILE_ROWS") {
            if let Ok(rows) = val.parse() {
                config.tile_rows = rows;
            }
        }

        if let Ok(val) = std::env::var("RASTER_PARALLEL") {
            config.parallel = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("RASTER_RESOLVE_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.resolve_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("RASTER_RESOLVE_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.resolve_concurrency = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_rows == 0 {
            return Err("tile_rows must be > 0".to_string());
        }

        if self.resolve_timeout_secs == 0 {
            return Err("resolve_timeout_secs must be > 0".to_string());
        }

        if self.resolve_concurrency == 0 {
            return Err("resolve_concurrency must be > 0".to_string());
        }

        Ok(())
    }

    /// Per-record resolution deadline.
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}

/// Parameters of a temporal composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeConfig {
    pub reduction: Reduction,

    /// Reduce over valid pixels only; otherwise any nodata poisons the pixel.
    pub ignore_nodata: bool,

    /// Grid reconciliation policy. Deliberately has no default.
    pub extent_policy: ExtentPolicy,
}

impl CompositeConfig {
    pub fn new(reduction: Reduction, ignore_nodata: bool, extent_policy: ExtentPolicy) -> Self {
        Self {
            reduction,
            ignore_nodata,
            extent_policy,
        }
    }

    pub fn median(ignore_nodata: bool, extent_policy: ExtentPolicy) -> Self {
        Self::new(Reduction::Median, ignore_nodata, extent_policy)
    }

    pub fn mean(ignore_nodata: bool, extent_policy: ExtentPolicy) -> Self {
        Self::new(Reduction::Mean, ignore_nodata, extent_policy)
    }
}

/// Bit-encoded quality band masking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaMaskConfig {
    /// Name of the QA band.
    pub qa_band: String,

    /// Bit positions that flag a pixel as cloud/shadow/invalid.
    pub bits: Vec<u8>,

    /// Drop the QA band from masked output rasters.
    pub drop_qa_band: bool,
}

impl QaMaskConfig {
    pub fn new(qa_band: impl Into<String>, bits: Vec<u8>) -> Self {
        Self {
            qa_band: qa_band.into(),
            bits,
            drop_qa_band: true,
        }
    }

    /// Landsat Collection 2 `qa_pixel`: dilated cloud (1), cirrus (2),
    /// cloud (3) and cloud shadow (4).
    pub fn landsat_c2_cloud() -> Self {
        Self::new("qa_pixel", vec![1, 2, 3, 4])
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.qa_band.is_empty() {
            return Err("qa_band must not be empty".to_string());
        }

        if self.bits.is_empty() {
            return Err("at least one QA bit is required".to_string());
        }

        if let Some(bit) = self.bits.iter().find(|&&b| b >= 32) {
            return Err(format!("QA bit {} out of range 0-31", bit));
        }

        Ok(())
    }

    /// Combined bit mask of all selected bits.
    pub fn bit_mask(&self) -> u32 {
        self.bits.iter().fold(0u32, |acc, &bit| acc | (1u32 << bit))
    }
}

/// Classification band masking: pixels whose class is listed are invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMaskConfig {
    /// Name of the classification band.
    pub class_band: String,

    /// Class values treated as invalid.
    pub invalid_classes: Vec<u16>,

    /// Drop the classification band from masked output rasters.
    pub drop_class_band: bool,
}

impl ClassMaskConfig {
    pub fn new(class_band: impl Into<String>, invalid_classes: Vec<u16>) -> Self {
        Self {
            class_band: class_band.into(),
            invalid_classes,
            drop_class_band: true,
        }
    }

    /// Sentinel-2 L2A scene classification: no data (0), saturated (1),
    /// cloud shadow (3), cloud medium/high probability (8, 9), cirrus (10).
    pub fn sentinel2_scl_cloud() -> Self {
        Self::new("SCL", vec![0, 1, 3, 8, 9, 10])
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.class_band.is_empty() {
            return Err("class_band must not be empty".to_string());
        }

        if self.invalid_classes.is_empty() {
            return Err("at least one invalid class is required".to_string());
        }

        Ok(())
    }
}

/// Thresholding of one band into a 0/1 detection mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Band to threshold.
    pub band: String,

    /// Pixels strictly greater than this value become 1.
    pub threshold: f32,

    /// Name of the output band.
    pub output: String,
}

impl ThresholdConfig {
    pub fn new(band: impl Into<String>, threshold: f32, output: impl Into<String>) -> Self {
        Self {
            band: band.into(),
            threshold,
            output: output.into(),
        }
    }
}

/// Normalized difference index `(a - b) / (a + b)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedDifferenceConfig {
    pub band_a: String,
    pub band_b: String,
    pub output: String,
}

impl NormalizedDifferenceConfig {
    pub fn new(
        band_a: impl Into<String>,
        band_b: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            band_a: band_a.into(),
            band_b: band_b.into(),
            output: output.into(),
        }
    }

    /// McFeeters NDWI from green and near-infrared bands.
    pub fn ndwi(green: impl Into<String>, nir: impl Into<String>) -> Self {
        Self::new(green, nir, "ndwi")
    }

    /// NDVI from near-infrared and red bands.
    pub fn ndvi(nir: impl Into<String>, red: impl Into<String>) -> Self {
        Self::new(nir, red, "ndvi")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProcessorConfig::default();
        assert_eq!(config.tile_rows, 256);
        assert!(config.parallel);
        assert_eq!(config.resolve_timeout(), Duration::from_secs(30));
        assert_eq!(config.resolve_concurrency, 8);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ProcessorConfig::default();
        assert!(config.validate().is_ok());

        config.tile_rows = 0;
        assert!(config.validate().is_err());

        config = ProcessorConfig::default();
        config.resolve_timeout_secs = 0;
        assert!(config.validate().is_err());

        config = ProcessorConfig::default();
        config.resolve_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_qa_bit_mask() {
        let config = QaMaskConfig::landsat_c2_cloud();
        assert_eq!(config.bit_mask(), 0b1_1110);
        assert!(config.validate().is_ok());

        let bad = QaMaskConfig::new("qa", vec![3, 32]);
        assert!(bad.validate().is_err());
        assert!(QaMaskConfig::new("qa", vec![]).validate().is_err());
    }

    #[test]
    fn test_class_mask_validation() {
        assert!(ClassMaskConfig::sentinel2_scl_cloud().validate().is_ok());
        assert!(ClassMaskConfig::new("", vec![3]).validate().is_err());
    }
}
