//! Multi-band raster grids.
//!
//! A [`Raster`] is an immutable value: every operation returns a new raster.
//! Pixel data is stored per band in row-major order, top row first, so pixel
//! `(row, col)` lives at index `row * width + col` in every band.

use std::collections::HashSet;
use std::fmt;

use raster_common::{Crs, Extent};

use crate::error::{RasterProcessorError, Result};
use crate::types::PixelSize;

/// Relative tolerance (in pixels) for comparing extents of two grids.
const GRID_TOLERANCE_PIXELS: f64 = 1e-6;

/// One named 2-D grid of values.
///
/// A pixel is valid when it is not flagged invalid by a mask, is not NaN and
/// does not equal the nodata sentinel. Masking only flags pixels; values are
/// left untouched.
#[derive(Clone, PartialEq)]
pub struct Band {
    name: String,
    data: Vec<f32>,
    nodata: Option<f32>,
    valid: Option<Vec<bool>>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            data,
            nodata: None,
            valid: None,
        }
    }

    /// Set the nodata sentinel value.
    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    /// Attach an explicit validity mask (`true` = valid). Pixels past the end
    /// of a short mask are invalid.
    pub fn with_validity(mut self, valid: Vec<bool>) -> Self {
        self.valid = Some(valid);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw values, including pixels flagged as nodata.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check whether the pixel at a flat index holds usable data.
    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        let Some(&value) = self.data.get(idx) else {
            return false;
        };
        if value.is_nan() {
            return false;
        }
        if self.nodata == Some(value) {
            return false;
        }
        self.valid
            .as_ref()
            .map_or(true, |mask| mask.get(idx).copied().unwrap_or(false))
    }

    /// The value at a flat index, or `None` if it is nodata.
    #[inline]
    pub fn valid_value(&self, idx: usize) -> Option<f32> {
        self.is_valid(idx).then(|| self.data[idx])
    }

    /// Number of valid pixels.
    pub fn valid_count(&self) -> usize {
        (0..self.data.len()).filter(|&i| self.is_valid(i)).count()
    }

    /// Per-pixel validity, materialized.
    pub fn validity(&self) -> Vec<bool> {
        (0..self.data.len()).map(|i| self.is_valid(i)).collect()
    }

    /// Value written into output pixels that are nodata.
    pub fn fill_value(&self) -> f32 {
        self.nodata.unwrap_or(f32::NAN)
    }

    /// A copy of this band with additional pixels flagged invalid.
    pub(crate) fn masked(&self, invalid: &[bool]) -> Band {
        let valid = match &self.valid {
            Some(existing) => existing
                .iter()
                .zip(invalid)
                .map(|(&v, &bad)| v && !bad)
                .collect(),
            None => invalid.iter().map(|&bad| !bad).collect(),
        };
        Band {
            name: self.name.clone(),
            data: self.data.clone(),
            nodata: self.nodata,
            valid: Some(valid),
        }
    }

    pub(crate) fn renamed(&self, name: impl Into<String>) -> Band {
        Band {
            name: name.into(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Band")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .field("nodata", &self.nodata)
            .field("masked", &self.valid.is_some())
            .finish()
    }
}

/// A multi-band grid with a spatial reference and extent.
///
/// All bands share the grid dimensions; the extent covers the outer edges of
/// the outermost pixels.
#[derive(Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    bands: Vec<Band>,
    crs: Crs,
    extent: Extent,
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bands: Vec<&str> = self.bands.iter().map(|band| band.name()).collect();
        f.debug_struct("Raster")
            .field("shape", &(self.width, self.height))
            .field("bands", &bands)
            .field("crs", &self.crs.to_string())
            .field("extent", &self.extent)
            .finish()
    }
}

impl Raster {
    /// Create a raster, validating band sizes, band name uniqueness and the
    /// extent.
    pub fn new(
        width: usize,
        height: usize,
        bands: Vec<Band>,
        crs: Crs,
        extent: Extent,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RasterProcessorError::invalid_raster(format!(
                "grid dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }

        if bands.is_empty() {
            return Err(RasterProcessorError::invalid_raster(
                "raster must have at least one band",
            ));
        }

        extent.validate()?;

        let expected = width * height;
        let mut names = HashSet::new();
        for band in &bands {
            if band.len() != expected {
                return Err(RasterProcessorError::invalid_raster(format!(
                    "band '{}' has {} values, expected {}",
                    band.name(),
                    band.len(),
                    expected
                )));
            }
            if let Some(valid) = &band.valid {
                if valid.len() != expected {
                    return Err(RasterProcessorError::invalid_raster(format!(
                        "validity mask of band '{}' has {} entries, expected {}",
                        band.name(),
                        valid.len(),
                        expected
                    )));
                }
            }
            if !names.insert(band.name()) {
                return Err(RasterProcessorError::invalid_raster(format!(
                    "duplicate band name '{}'",
                    band.name()
                )));
            }
        }

        Ok(Self {
            width,
            height,
            bands,
            crs,
            extent,
        })
    }

    /// Convenience constructor for a single-band raster.
    pub fn single_band(
        name: impl Into<String>,
        width: usize,
        height: usize,
        data: Vec<f32>,
        crs: Crs,
        extent: Extent,
    ) -> Result<Self> {
        Self::new(width, height, vec![Band::new(name, data)], crs, extent)
    }

    /// A raster on this raster's grid with different bands.
    ///
    /// Callers guarantee the bands match the grid size.
    pub(crate) fn derived(&self, bands: Vec<Band>) -> Raster {
        Raster {
            width: self.width,
            height: self.height,
            bands,
            crs: self.crs.clone(),
            extent: self.extent,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Grid dimensions (width, height).
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of pixels per band.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(Band::name).collect()
    }

    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.bands.iter().position(|band| band.name() == name)
    }

    /// Look up a band by name.
    pub fn band(&self, name: &str) -> Result<&Band> {
        self.bands
            .iter()
            .find(|band| band.name() == name)
            .ok_or_else(|| {
                RasterProcessorError::invalid_band(format!(
                    "'{}' not found, available: {:?}",
                    name,
                    self.band_names()
                ))
            })
    }

    /// Ground size of one pixel.
    pub fn pixel_size(&self) -> PixelSize {
        PixelSize::new(
            self.extent.width() / self.width as f64,
            self.extent.height() / self.height as f64,
        )
    }

    /// Flat index of a grid position.
    #[inline]
    pub fn pixel_index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    /// The valid value of a band at a grid position.
    pub fn get(&self, band: &str, row: usize, col: usize) -> Result<Option<f32>> {
        if row >= self.height || col >= self.width {
            return Err(RasterProcessorError::invalid_raster(format!(
                "pixel ({}, {}) outside {}x{} grid",
                row, col, self.width, self.height
            )));
        }
        Ok(self.band(band)?.valid_value(self.pixel_index(row, col)))
    }

    /// Whether both rasters describe the same pixel grid.
    pub fn same_grid(&self, other: &Raster) -> bool {
        let tolerance = self.pixel_size().width.abs().min(self.pixel_size().height.abs())
            * GRID_TOLERANCE_PIXELS;
        self.crs == other.crs
            && self.shape() == other.shape()
            && self.extent.approx_eq(&other.extent, tolerance)
    }

    /// Fail with an alignment error unless both rasters share a grid.
    pub fn check_aligned(&self, other: &Raster) -> Result<()> {
        if self.crs != other.crs {
            return Err(RasterProcessorError::alignment(format!(
                "CRS mismatch: {} vs {}",
                self.crs, other.crs
            )));
        }
        if self.shape() != other.shape() {
            return Err(RasterProcessorError::alignment(format!(
                "grid shape mismatch: {:?} vs {:?}",
                self.shape(),
                other.shape()
            )));
        }
        if !self.same_grid(other) {
            return Err(RasterProcessorError::alignment(format!(
                "extent mismatch: {} vs {}",
                self.extent, other.extent
            )));
        }
        Ok(())
    }

    /// Keep only the named bands, in the given order.
    pub fn select_bands<S: AsRef<str>>(&self, names: &[S]) -> Result<Raster> {
        if names.is_empty() {
            return Err(RasterProcessorError::invalid_band(
                "band selection must not be empty",
            ));
        }
        let bands = names
            .iter()
            .map(|name| self.band(name.as_ref()).cloned())
            .collect::<Result<Vec<_>>>()?;
        Raster::new(
            self.width,
            self.height,
            bands,
            self.crs.clone(),
            self.extent,
        )
    }

    /// Remove one band. Removing the last band is an error.
    pub fn without_band(&self, name: &str) -> Result<Raster> {
        self.band(name)?;
        let bands: Vec<Band> = self
            .bands
            .iter()
            .filter(|band| band.name() != name)
            .cloned()
            .collect();
        if bands.is_empty() {
            return Err(RasterProcessorError::invalid_band(format!(
                "cannot remove '{}', it is the only band",
                name
            )));
        }
        Ok(self.derived(bands))
    }

    /// Append a band.
    pub fn with_band(&self, band: Band) -> Result<Raster> {
        let mut bands = self.bands.clone();
        bands.push(band);
        Raster::new(
            self.width,
            self.height,
            bands,
            self.crs.clone(),
            self.extent,
        )
    }

    /// Rename one band.
    pub fn rename_band(&self, from: &str, to: &str) -> Result<Raster> {
        let idx = self.band_index(from).ok_or_else(|| {
            RasterProcessorError::invalid_band(format!("'{}' not found", from))
        })?;
        if from != to && self.band_index(to).is_some() {
            return Err(RasterProcessorError::invalid_band(format!(
                "band '{}' already exists",
                to
            )));
        }
        let mut bands = self.bands.clone();
        bands[idx] = bands[idx].renamed(to);
        Ok(self.derived(bands))
    }

    /// Flag pixels invalid in every band.
    ///
    /// `invalid` holds one flag per pixel; flagged pixels keep their values.
    pub fn mask_pixels(&self, invalid: &[bool]) -> Result<Raster> {
        if invalid.len() != self.len() {
            return Err(RasterProcessorError::alignment(format!(
                "mask has {} pixels, raster has {}",
                invalid.len(),
                self.len()
            )));
        }
        let bands = self.bands.iter().map(|band| band.masked(invalid)).collect();
        Ok(self.derived(bands))
    }

    /// Extract a rectangular window of pixels.
    pub fn window(&self, row: usize, col: usize, rows: usize, cols: usize) -> Result<Raster> {
        if rows == 0 || cols == 0 || row + rows > self.height || col + cols > self.width {
            return Err(RasterProcessorError::invalid_raster(format!(
                "window ({}, {}) {}x{} outside {}x{} grid",
                row, col, cols, rows, self.width, self.height
            )));
        }

        let px = self.pixel_size();
        let min_x = self.extent.min_x + col as f64 * px.width;
        let max_y = self.extent.max_y - row as f64 * px.height;
        let extent = Extent::new(
            min_x,
            max_y - rows as f64 * px.height,
            min_x + cols as f64 * px.width,
            max_y,
        );

        let bands = self
            .bands
            .iter()
            .map(|band| {
                let mut data = Vec::with_capacity(rows * cols);
                let mut valid = Vec::with_capacity(rows * cols);
                for r in row..row + rows {
                    let start = r * self.width + col;
                    data.extend_from_slice(&band.data[start..start + cols]);
                    valid.extend((start..start + cols).map(|i| band.is_valid(i)));
                }
                Band {
                    name: band.name.clone(),
                    data,
                    nodata: band.nodata,
                    valid: band.valid.as_ref().map(|_| valid),
                }
            })
            .collect();

        Ok(Raster {
            width: cols,
            height: rows,
            bands,
            crs: self.crs.clone(),
            extent,
        })
    }
}
