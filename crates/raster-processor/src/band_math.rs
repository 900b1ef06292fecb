//! Band math on rasters.
//!
//! Every operation returns a single-band raster on the input grid. Invalid
//! input pixels (masked, NaN, or equal to the nodata sentinel) produce NaN
//! in the output, which downstream reductions treat as nodata.

use rayon::prelude::*;

use crate::collection::{SceneTransform, TransformOutput};
use crate::config::{NormalizedDifferenceConfig, ThresholdConfig};
use crate::error::Result;
use crate::raster::{Band, Raster};
use crate::scene::SceneRecord;
use crate::types::BandOp;

/// Apply a unary function to every valid pixel of one band.
///
/// # Example
/// ```ignore
/// let reflectance = map_band(&scene, "B03", "green", |dn| dn * 0.0001)?;
/// ```
pub fn map_band<F>(raster: &Raster, name: &str, output: &str, f: F) -> Result<Raster>
where
    F: Fn(f32) -> f32 + Sync + Send,
{
    let band = raster.band(name)?;
    let data: Vec<f32> = (0..band.len())
        .into_par_iter()
        .map(|idx| match band.valid_value(idx) {
            Some(value) => f(value),
            None => f32::NAN,
        })
        .collect();
    Ok(raster.derived(vec![Band::new(output, data)]))
}

/// Combine two bands pixel by pixel. Nodata in either input gives nodata.
pub fn combine_bands(
    raster: &Raster,
    a: &str,
    b: &str,
    output: &str,
    op: BandOp,
) -> Result<Raster> {
    let band_a = raster.band(a)?;
    let band_b = raster.band(b)?;
    let data: Vec<f32> = (0..band_a.len())
        .into_par_iter()
        .map(|idx| {
            band_a
                .valid_value(idx)
                .zip(band_b.valid_value(idx))
                .and_then(|(va, vb)| op.apply(va, vb))
                .unwrap_or(f32::NAN)
        })
        .collect();
    Ok(raster.derived(vec![Band::new(output, data)]))
}

/// `(a - b) / (a + b)`; a zero denominator gives nodata.
///
/// With green and near-infrared this is the McFeeters NDWI used for water
/// detection.
pub fn normalized_difference(raster: &Raster, a: &str, b: &str, output: &str) -> Result<Raster> {
    let band_a = raster.band(a)?;
    let band_b = raster.band(b)?;
    let data: Vec<f32> = (0..band_a.len())
        .into_par_iter()
        .map(|idx| match (band_a.valid_value(idx), band_b.valid_value(idx)) {
            (Some(va), Some(vb)) => {
                let sum = va as f64 + vb as f64;
                if sum.abs() < f64::EPSILON {
                    f32::NAN
                } else {
                    ((va as f64 - vb as f64) / sum) as f32
                }
            }
            _ => f32::NAN,
        })
        .collect();
    Ok(raster.derived(vec![Band::new(output, data)]))
}

/// Binary detection mask: 1 where the band is strictly above the threshold,
/// 0 where it is not, nodata where the input is nodata.
pub fn threshold(raster: &Raster, config: &ThresholdConfig) -> Result<Raster> {
    map_band(raster, &config.band, &config.output, |value| {
        if value > config.threshold {
            1.0
        } else {
            0.0
        }
    })
}

/// Per-scene normalized difference index.
#[derive(Debug, Clone)]
pub struct NormalizedDifference {
    pub config: NormalizedDifferenceConfig,
}

impl NormalizedDifference {
    pub fn new(config: NormalizedDifferenceConfig) -> Self {
        Self { config }
    }
}

impl SceneTransform for NormalizedDifference {
    fn apply(&self, _record: &SceneRecord, raster: &Raster) -> Result<TransformOutput> {
        normalized_difference(
            raster,
            &self.config.band_a,
            &self.config.band_b,
            &self.config.output,
        )
        .map(TransformOutput::new)
    }
}

/// Per-scene threshold into a 0/1 mask.
#[derive(Debug, Clone)]
pub struct Threshold {
    pub config: ThresholdConfig,
}

impl Threshold {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }
}

impl SceneTransform for Threshold {
    fn apply(&self, _record: &SceneRecord, raster: &Raster) -> Result<TransformOutput> {
        threshold(raster, &self.config).map(TransformOutput::new)
    }
}
