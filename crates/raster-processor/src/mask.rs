//! Quality-band masking.
//!
//! Masks never touch pixel values: flagged pixels are marked invalid on every
//! band so later statistics skip them. The quality band must already share
//! the target grid; no resampling happens here.

use tracing::{debug, instrument};

use crate::collection::{SceneTransform, TransformOutput};
use crate::config::{ClassMaskConfig, QaMaskConfig};
use crate::error::{RasterProcessorError, Result};
use crate::raster::{Band, Raster};
use crate::scene::SceneRecord;

/// Per-pixel "any selected bit set" flags of a bit-encoded QA band.
///
/// QA pixels that are themselves nodata, negative, or non-integral are
/// flagged as well.
pub fn decode_qa_flags(qa: &Band, bits: &[u8]) -> Result<Vec<bool>> {
    if let Some(bit) = bits.iter().find(|&&b| b >= 32) {
        return Err(RasterProcessorError::Config(format!(
            "QA bit {} out of range 0-31",
            bit
        )));
    }
    let mask = bits.iter().fold(0u32, |acc, &bit| acc | (1u32 << bit));

    Ok((0..qa.len())
        .map(|idx| match qa.valid_value(idx) {
            Some(value) if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f32 => {
                (value as u32) & mask != 0
            }
            _ => true,
        })
        .collect())
}

/// Per-pixel flags for a classification band: set where the class is listed.
pub fn decode_class_flags(classes: &Band, invalid_classes: &[u16]) -> Vec<bool> {
    (0..classes.len())
        .map(|idx| match classes.valid_value(idx) {
            Some(value) if value >= 0.0 && value.fract() == 0.0 => {
                value <= u16::MAX as f32 && invalid_classes.contains(&(value as u16))
            }
            _ => true,
        })
        .collect()
}

fn apply_flags(target: &Raster, flags: &[bool], drop_band: Option<&str>) -> Result<Raster> {
    let masked = target.mask_pixels(flags)?;
    match drop_band {
        Some(name) if masked.band_index(name).is_some() && masked.num_bands() > 1 => {
            masked.without_band(name)
        }
        _ => Ok(masked),
    }
}

fn qa_band_of<'a>(raster: &'a Raster, name: &str) -> Result<&'a Band> {
    raster.band(name).map_err(|_| {
        RasterProcessorError::invalid_band(format!(
            "quality band '{}' not found (bands: {})",
            name,
            raster.band_names().join(", ")
        ))
    })
}

/// Masks rasters with a bit-encoded QA band such as Landsat `qa_pixel`.
#[derive(Debug, Clone)]
pub struct QaMasker {
    config: QaMaskConfig,
}

impl QaMasker {
    pub fn new(config: QaMaskConfig) -> Result<Self> {
        config.validate().map_err(RasterProcessorError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &QaMaskConfig {
        &self.config
    }

    /// Mask a raster that carries its own QA band.
    #[instrument(skip(self, raster), fields(qa_band = %self.config.qa_band))]
    pub fn mask(&self, raster: &Raster) -> Result<Raster> {
        let flags = decode_qa_flags(qa_band_of(raster, &self.config.qa_band)?, &self.config.bits)?;
        debug!(
            flagged = flags.iter().filter(|&&f| f).count(),
            total = flags.len(),
            "Decoded QA flags"
        );
        let drop = self.config.drop_qa_band.then_some(self.config.qa_band.as_str());
        apply_flags(raster, &flags, drop)
    }

    /// Mask `target` using the QA band of a separate, aligned raster.
    pub fn mask_with(&self, target: &Raster, qa: &Raster) -> Result<Raster> {
        target.check_aligned(qa)?;
        let flags = decode_qa_flags(qa_band_of(qa, &self.config.qa_band)?, &self.config.bits)?;
        apply_flags(target, &flags, None)
    }
}

impl SceneTransform for QaMasker {
    fn apply(&self, _record: &SceneRecord, raster: &Raster) -> Result<TransformOutput> {
        self.mask(raster).map(TransformOutput::new)
    }
}

/// Masks rasters with a classification band such as Sentinel-2 `SCL`.
#[derive(Debug, Clone)]
pub struct ClassMasker {
    config: ClassMaskConfig,
}

impl ClassMasker {
    pub fn new(config: ClassMaskConfig) -> Result<Self> {
        config.validate().map_err(RasterProcessorError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClassMaskConfig {
        &self.config
    }

    /// Mask a raster that carries its own classification band.
    pub fn mask(&self, raster: &Raster) -> Result<Raster> {
        let flags = decode_class_flags(
            qa_band_of(raster, &self.config.class_band)?,
            &self.config.invalid_classes,
        );
        let drop = self
            .config
            .drop_class_band
            .then_some(self.config.class_band.as_str());
        apply_flags(raster, &flags, drop)
    }

    /// Mask `target` using the classification band of a separate raster.
    pub fn mask_with(&self, target: &Raster, classes: &Raster) -> Result<Raster> {
        target.check_aligned(classes)?;
        let flags = decode_class_flags(
            qa_band_of(classes, &self.config.class_band)?,
            &self.config.invalid_classes,
        );
        apply_flags(target, &flags, None)
    }
}

impl SceneTransform for ClassMasker {
    fn apply(&self, _record: &SceneRecord, raster: &Raster) -> Result<TransformOutput> {
        self.mask(raster).map(TransformOutput::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::{Crs, Extent};

    fn scene(red: Vec<f32>, qa: Vec<f32>) -> Raster {
        Raster::new(
            2,
            2,
            vec![Band::new("red", red), Band::new("qa_pixel", qa)],
            Crs::epsg(32633),
            Extent::new(0.0, 0.0, 60.0, 60.0),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_any_bit_set() {
        // bit 3 = 8, bit 4 = 16, bit 6 = 64 (clear)
        let qa = Band::new("qa", vec![0.0, 8.0, 16.0 + 64.0, 64.0]);
        let flags = decode_qa_flags(&qa, &[3, 4]).unwrap();
        assert_eq!(flags, vec![false, true, true, false]);
    }

    #[test]
    fn test_decode_nodata_qa_is_invalid() {
        let qa = Band::new("qa", vec![1.0, 0.0]).with_nodata(1.0);
        assert_eq!(decode_qa_flags(&qa, &[3]).unwrap(), vec![true, false]);
    }

    #[test]
    fn test_decode_short_validity_mask_flags_tail() {
        let qa = Band::new("qa", vec![0.0, 8.0, 0.0]).with_validity(vec![true]);
        assert_eq!(decode_qa_flags(&qa, &[3]).unwrap(), vec![false, true, true]);

        let classes = Band::new("scl", vec![4.0, 4.0]).with_validity(vec![true]);
        assert_eq!(decode_class_flags(&classes, &[9]), vec![false, true]);
    }

    #[test]
    fn test_decode_rejects_wide_bits() {
        let qa = Band::new("qa", vec![0.0]);
        assert!(matches!(
            decode_qa_flags(&qa, &[32]),
            Err(RasterProcessorError::Config(_))
        ));
        assert!(QaMasker::new(QaMaskConfig::new("qa", vec![40])).is_err());
    }

    #[test]
    fn test_mask_keeps_values_and_drops_qa_band() {
        let raster = scene(vec![0.1, 0.2, 0.3, 0.4], vec![0.0, 8.0, 0.0, 2.0]);
        let masker = QaMasker::new(QaMaskConfig::landsat_c2_cloud()).unwrap();
        let masked = masker.mask(&raster).unwrap();

        assert_eq!(masked.band_names(), vec!["red"]);
        let red = masked.band("red").unwrap();
        assert_eq!(red.data(), &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(red.validity(), vec![true, false, true, false]);
    }

    #[test]
    fn test_mask_with_requires_alignment() {
        let target = scene(vec![1.0; 4], vec![0.0; 4]);
        let qa = Raster::new(
            2,
            2,
            vec![Band::new("qa_pixel", vec![8.0; 4])],
            Crs::epsg(32633),
            Extent::new(60.0, 0.0, 120.0, 60.0),
        )
        .unwrap();
        let masker = QaMasker::new(QaMaskConfig::landsat_c2_cloud()).unwrap();
        assert!(matches!(
            masker.mask_with(&target, &qa),
            Err(RasterProcessorError::Alignment(_))
        ));
    }

    #[test]
    fn test_class_mask() {
        let raster = Raster::new(
            3,
            1,
            vec![
                Band::new("B04", vec![0.2, 0.3, 0.4]),
                Band::new("SCL", vec![4.0, 9.0, 3.0]),
            ],
            Crs::epsg(32633),
            Extent::new(0.0, 0.0, 30.0, 10.0),
        )
        .unwrap();
        let masker = ClassMasker::new(ClassMaskConfig::sentinel2_scl_cloud()).unwrap();
        let masked = masker.mask(&raster).unwrap();
        assert_eq!(masked.band_names(), vec!["B04"]);
        assert_eq!(
            masked.band("B04").unwrap().validity(),
            vec![true, false, false]
        );
    }

    #[test]
    fn test_missing_qa_band() {
        let raster = Raster::single_band(
            "red",
            1,
            1,
            vec![1.0],
            Crs::epsg(32633),
            Extent::new(0.0, 0.0, 1.0, 1.0),
        )
        .unwrap();
        let masker = QaMasker::new(QaMaskConfig::landsat_c2_cloud()).unwrap();
        assert!(matches!(
            masker.mask(&raster),
            Err(RasterProcessorError::InvalidBand(_))
        ));
    }
}
