//! Temporal compositing: per-pixel reduction of a raster stack.
//!
//! Inputs must share CRS, band layout and pixel size, and lie on one pixel
//! lattice. Their footprints may differ; the output grid is the union or the
//! intersection of the footprints, chosen explicitly by the caller. A pixel
//! outside an input's footprint counts as nodata for that input.
//!
//! The output is computed in row strips of `tile_rows` rows. Strips are
//! independent and run on the rayon pool when parallelism is enabled.

use std::sync::Arc;

use rayon::prelude::*;
use raster_common::{Extent, TimeRange};
use tracing::{debug, info, instrument};

use crate::collection::RasterCollection;
use crate::config::{CompositeConfig, ProcessorConfig};
use crate::error::{RasterProcessorError, Result};
use crate::raster::{Band, Raster};
use crate::types::{ExtentPolicy, Reduction};

/// Offsets must be this close to whole pixels to count as co-registered.
const LATTICE_TOLERANCE: f64 = 1e-6;

/// A reduced raster plus its provenance.
#[derive(Debug, Clone)]
pub struct CompositeRaster {
    pub raster: Raster,
    /// Number of scenes stacked into the composite.
    pub source_count: usize,
    pub reduction: Reduction,
    /// Acquisition times spanned by the inputs, when known.
    pub time_range: Option<TimeRange>,
}

/// Reduces raster stacks according to a [`CompositeConfig`].
#[derive(Debug, Clone)]
pub struct Compositor {
    config: CompositeConfig,
    processor: ProcessorConfig,
}

impl Compositor {
    pub fn new(config: CompositeConfig) -> Self {
        Self {
            config,
            processor: ProcessorConfig::default(),
        }
    }

    /// Use specific tiling/parallelism settings.
    pub fn with_processor_config(mut self, processor: ProcessorConfig) -> Self {
        self.processor = processor;
        self
    }

    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    /// Reduce every record of a collection into one composite.
    ///
    /// Fails with `InsufficientData` on an empty collection and with
    /// `Unresolved` if any record has no pixel payload.
    #[instrument(skip(self, collection), fields(records = collection.len(), reduction = %self.config.reduction))]
    pub fn composite(&self, collection: &RasterCollection) -> Result<CompositeRaster> {
        if collection.is_empty() {
            return Err(RasterProcessorError::insufficient_data(
                "cannot composite an empty collection",
            ));
        }

        let rasters = collection
            .iter()
            .map(|record| record.shared_raster())
            .collect::<Result<Vec<Arc<Raster>>>>()?;
        let refs: Vec<&Raster> = rasters.iter().map(|r| r.as_ref()).collect();

        let raster = self.composite_rasters(&refs)?;
        let time_range = TimeRange::spanning(collection.iter().map(|r| r.acquisition_time()));

        info!(
            source_count = refs.len(),
            width = raster.width(),
            height = raster.height(),
            "Composite complete"
        );

        Ok(CompositeRaster {
            raster,
            source_count: refs.len(),
            reduction: self.config.reduction,
            time_range,
        })
    }

    /// Reduce a stack of rasters directly.
    pub fn composite_rasters(&self, rasters: &[&Raster]) -> Result<Raster> {
        let Some(reference) = rasters.first() else {
            return Err(RasterProcessorError::insufficient_data(
                "cannot composite zero rasters",
            ));
        };

        check_stack_compatible(reference, rasters)?;

        let extent = reconcile_extent(rasters, self.config.extent_policy)?;
        let pixel = reference.pixel_size();
        let width = whole_pixels(extent.width() / pixel.width, "output width")?;
        let height = whole_pixels(extent.height() / pixel.height, "output height")?;
        if width <= 0 || height <= 0 {
            return Err(RasterProcessorError::alignment(format!(
                "reconciled extent {} is smaller than one pixel",
                extent
            )));
        }
        let (width, height) = (width as usize, height as usize);

        let placements = rasters
            .iter()
            .map(|raster| Placement::new(raster, &extent))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            width,
            height,
            policy = %self.config.extent_policy,
            "Reconciled composite grid"
        );

        let tile_len = self.processor.tile_rows.max(1) * width;
        let bands = (0..reference.num_bands())
            .map(|band_idx| {
                let template = &reference.bands()[band_idx];
                let mut data = vec![template.fill_value(); width * height];
                let mut valid = vec![false; width * height];

                let reduce = |(tile_idx, (data_tile, valid_tile)): (usize, (&mut [f32], &mut [bool]))| {
                    self.reduce_tile(
                        &placements,
                        band_idx,
                        width,
                        tile_idx * tile_len,
                        data_tile,
                        valid_tile,
                    )
                };

                if self.processor.parallel {
                    data.par_chunks_mut(tile_len)
                        .zip(valid.par_chunks_mut(tile_len))
                        .enumerate()
                        .for_each(reduce);
                } else {
                    data.chunks_mut(tile_len)
                        .zip(valid.chunks_mut(tile_len))
                        .enumerate()
                        .for_each(reduce);
                }

                // Empty pixels carry the input fill value, but validity comes
                // from the mask alone: a reduced value may equal the sentinel.
                Band::new(template.name(), data).with_validity(valid)
            })
            .collect();

        Raster::new(width, height, bands, reference.crs().clone(), extent)
    }

    /// Reduce one strip of output pixels starting at flat index `start`.
    fn reduce_tile(
        &self,
        placements: &[Placement<'_>],
        band_idx: usize,
        width: usize,
        start: usize,
        data: &mut [f32],
        valid: &mut [bool],
    ) {
        let mut stack = Vec::with_capacity(placements.len());

        for (offset, (out, out_valid)) in data.iter_mut().zip(valid.iter_mut()).enumerate() {
            let flat = start + offset;
            let (row, col) = (flat / width, flat % width);

            stack.clear();
            let mut complete = true;
            for placement in placements {
                match placement.value(band_idx, row, col) {
                    Some(value) => stack.push(value),
                    None => complete = false,
                }
            }

            if !self.config.ignore_nodata && !complete {
                continue;
            }

            if let Some(value) = self.config.reduction.apply(&mut stack) {
                *out = value;
                *out_valid = true;
            }
        }
    }
}

/// Where an input raster sits on the output grid.
struct Placement<'a> {
    raster: &'a Raster,
    row_offset: isize,
    col_offset: isize,
}

impl<'a> Placement<'a> {
    fn new(raster: &'a Raster, target: &Extent) -> Result<Self> {
        let pixel = raster.pixel_size();
        let col_offset = whole_pixels(
            (raster.extent().min_x - target.min_x) / pixel.width,
            "column offset",
        )?;
        let row_offset = whole_pixels(
            (target.max_y - raster.extent().max_y) / pixel.height,
            "row offset",
        )?;
        Ok(Self {
            raster,
            row_offset,
            col_offset,
        })
    }

    /// Valid input value under an output pixel, if any.
    #[inline]
    fn value(&self, band_idx: usize, row: usize, col: usize) -> Option<f32> {
        let src_row = row as isize - self.row_offset;
        let src_col = col as isize - self.col_offset;
        if src_row < 0
            || src_col < 0
            || src_row >= self.raster.height() as isize
            || src_col >= self.raster.width() as isize
        {
            return None;
        }
        let idx = self.raster.pixel_index(src_row as usize, src_col as usize);
        self.raster.bands()[band_idx].valid_value(idx)
    }
}

/// Round a pixel count, rejecting values off the pixel lattice.
fn whole_pixels(value: f64, what: &str) -> Result<isize> {
    let rounded = value.round();
    if (value - rounded).abs() > LATTICE_TOLERANCE {
        return Err(RasterProcessorError::alignment(format!(
            "{} of {} pixels is not on a common pixel lattice",
            what, value
        )));
    }
    Ok(rounded as isize)
}

fn check_stack_compatible(reference: &Raster, rasters: &[&Raster]) -> Result<()> {
    let pixel = reference.pixel_size();
    let tolerance = pixel.width.abs().min(pixel.height.abs()) * LATTICE_TOLERANCE;
    let names = reference.band_names();

    for (idx, raster) in rasters.iter().enumerate().skip(1) {
        if raster.crs() != reference.crs() {
            return Err(RasterProcessorError::alignment(format!(
                "raster {} has CRS {}, expected {}",
                idx,
                raster.crs(),
                reference.crs()
            )));
        }
        if raster.band_names() != names {
            return Err(RasterProcessorError::alignment(format!(
                "raster {} has bands {:?}, expected {:?}",
                idx,
                raster.band_names(),
                names
            )));
        }
        if !raster.pixel_size().approx_eq(&pixel, tolerance) {
            return Err(RasterProcessorError::alignment(format!(
                "raster {} has pixel size {:?}, expected {:?}",
                idx,
                raster.pixel_size(),
                pixel
            )));
        }
    }
    Ok(())
}

fn reconcile_extent(rasters: &[&Raster], policy: ExtentPolicy) -> Result<Extent> {
    let mut extent = *rasters[0].extent();
    for raster in &rasters[1..] {
        extent = match policy {
            ExtentPolicy::Union => extent.union(raster.extent()),
            ExtentPolicy::Intersection => extent.intersection(raster.extent()).ok_or_else(|| {
                RasterProcessorError::alignment(format!(
                    "extents {} and {} do not overlap",
                    extent,
                    raster.extent()
                ))
            })?,
        };
    }
    Ok(extent)
}
