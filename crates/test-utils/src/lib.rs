//! Shared test utilities for the temporal-raster workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic band generators (reflectance, QA bits, detection masks)
//! - Fixed extents, CRS codes and acquisition dates
//! - Approximate float assertions
//! - Tracing setup for tests
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, fixtures, create_reflectance_grid};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `debug` for the workspace crates. Output
/// goes through the test writer so it is captured per test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "raster_processor=debug,raster_common=debug".into());
        // Another harness may already have installed a global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Element-wise approximate equality of two pixel slices.
///
/// NaN matches NaN, so nodata positions can be compared directly.
///
/// ```ignore
/// use test_utils::assert_pixels_approx_eq;
///
/// assert_pixels_approx_eq!(band.data(), &[0.1, f32::NAN], 1e-6);
/// ```
#[macro_export]
macro_rules! assert_pixels_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: &[f32] = $left;
        let right: &[f32] = $right;
        assert_eq!(left.len(), right.len(), "pixel count differs");
        for (idx, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            if l.is_nan() && r.is_nan() {
                continue;
            }
            if l.is_nan() != r.is_nan() || ((*l as f64) - (*r as f64)).abs() > $epsilon as f64 {
                panic!(
                    "assertion failed: pixel {} differs\n  left: `{:?}`,\n right: `{:?}`",
                    idx, l, r
                );
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_pixels_approx_eq_treats_nan_as_equal() {
        assert_pixels_approx_eq!(&[0.1, f32::NAN, 3.0], &[0.1000001, f32::NAN, 3.0], 1e-5);
    }

    #[test]
    #[should_panic(expected = "pixel 1 differs")]
    fn test_pixels_approx_eq_fails_on_nan_mismatch() {
        assert_pixels_approx_eq!(&[0.1, f32::NAN], &[0.1, 0.2], 1e-5);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
