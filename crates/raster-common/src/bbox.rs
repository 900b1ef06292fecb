//! Spatial extent types and operations.

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// Absolute tolerance used when comparing extent edges.
pub const EXTENT_TOLERANCE: f64 = 1e-9;

/// The ground footprint of a raster or scene, in the units of its CRS.
///
/// For geographic CRS (EPSG:4326), coordinates are in degrees.
/// For projected CRS (UTM zones, etc.), coordinates are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Create a new extent from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create an extent, rejecting inverted or non-finite corners.
    pub fn try_new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> CommonResult<Self> {
        let extent = Self::new(min_x, min_y, max_x, max_y);
        extent.validate()?;
        Ok(extent)
    }

    /// Parse a "xmin,ymin,xmax,ymax" string (the catalog bbox form).
    pub fn from_bbox_string(s: &str) -> CommonResult<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(CommonError::InvalidExtent(format!(
                "{}. Expected 'xmin,ymin,xmax,ymax'",
                s
            )));
        }

        let mut coords = [0.0f64; 4];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| CommonError::InvalidExtent(format!("invalid number: {}", part)))?;
        }

        Self::try_new(coords[0], coords[1], coords[2], coords[3])
    }

    /// Check that all corners are finite and min <= max on both axes.
    pub fn validate(&self) -> CommonResult<()> {
        let corners = [self.min_x, self.min_y, self.max_x, self.max_y];
        if corners.iter().any(|c| !c.is_finite()) {
            return Err(CommonError::InvalidExtent(format!(
                "non-finite corner in {:?}",
                self
            )));
        }
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(CommonError::InvalidExtent(format!("inverted extent {:?}", self)));
        }
        Ok(())
    }

    /// Width of the extent in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the extent in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Area in squared coordinate units.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Check if this extent overlaps another with a non-zero area.
    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Compute the intersection of two extents.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        if !self.intersects(other) {
            return None;
        }

        Some(Extent {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Smallest extent covering both inputs.
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Check if a point is contained within this extent.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Edge-wise comparison within an absolute tolerance.
    pub fn approx_eq(&self, other: &Extent, tolerance: f64) -> bool {
        (self.min_x - other.min_x).abs() <= tolerance
            && (self.min_y - other.min_y).abs() <= tolerance
            && (self.max_x - other.max_x).abs() <= tolerance
            && (self.max_y - other.max_y).abs() <= tolerance
    }
}

impl std::fmt::Display for Extent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}
