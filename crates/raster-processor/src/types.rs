//! Core enums and small value types for raster processing.

use serde::{Deserialize, Serialize};

/// Per-pixel reduction applied across a temporal stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// Middle value; the average of the two middle values for even counts.
    #[default]
    Median,
    /// Arithmetic mean.
    Mean,
}

impl Reduction {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "median" => Some(Self::Median),
            "mean" | "average" => Some(Self::Mean),
            _ => None,
        }
    }

    /// Reduce a non-empty set of values.
    ///
    /// `values` is reordered in place by the median. Accumulation happens in
    /// f64 so the result does not depend on summation width.
    pub fn apply(&self, values: &mut [f32]) -> Option<f32> {
        if values.is_empty() {
            return None;
        }
        match self {
            Self::Mean => {
                let sum: f64 = values.iter().map(|&v| v as f64).sum();
                Some((sum / values.len() as f64) as f32)
            }
            Self::Median => {
                values.sort_unstable_by(|a, b| a.total_cmp(b));
                let mid = values.len() / 2;
                if values.len() % 2 == 1 {
                    Some(values[mid])
                } else {
                    let lower = values[mid - 1] as f64;
                    let upper = values[mid] as f64;
                    Some(((lower + upper) / 2.0) as f32)
                }
            }
        }
    }
}

impl std::fmt::Display for Reduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Median => write!(f, "median"),
            Self::Mean => write!(f, "mean"),
        }
    }
}

/// How the pixel grids of a stack are reconciled before reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtentPolicy {
    /// Output covers every input footprint; uncovered pixels are nodata.
    Union,
    /// Output covers only the area shared by every input.
    Intersection,
}

impl ExtentPolicy {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "union" | "unionof" => Some(Self::Union),
            "intersection" | "intersectionof" => Some(Self::Intersection),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExtentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Union => write!(f, "union"),
            Self::Intersection => write!(f, "intersection"),
        }
    }
}

/// Ground size of one pixel, in CRS units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: f64,
    pub height: f64,
}

impl PixelSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Square pixels, e.g. `PixelSize::square(10.0)` for Sentinel-2 10 m bands.
    pub fn square(size: f64) -> Self {
        Self::new(size, size)
    }

    /// Ground area covered by one pixel.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn approx_eq(&self, other: &PixelSize, tolerance: f64) -> bool {
        (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

/// Binary band arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Min,
    Max,
}

impl BandOp {
    /// Apply the operation; `None` when the result is undefined.
    pub fn apply(&self, a: f32, b: f32) -> Option<f32> {
        let value = match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => {
                if b == 0.0 {
                    return None;
                }
                a / b
            }
            Self::Min => a.min(b),
            Self::Max => a.max(b),
        };
        value.is_finite().then_some(value)
    }
}
