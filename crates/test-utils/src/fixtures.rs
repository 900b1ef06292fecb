//! Common test fixtures: grids, CRS codes and acquisition dates.

use chrono::{DateTime, TimeZone, Utc};
use raster_common::{Crs, Extent};

/// Common spatial references for testing.
pub mod crs {
    /// WGS 84 / UTM zone 33N, a typical Sentinel-2 tile projection.
    pub const UTM_33N: u32 = 32633;

    /// WGS 84 / UTM zone 18N, used by the Landsat fixtures.
    pub const UTM_18N: u32 = 32618;
}

/// Common band names for testing.
pub mod bands {
    pub const S2_GREEN: &str = "B03";
    pub const S2_RED: &str = "B04";
    pub const S2_NIR: &str = "B08";
    pub const S2_SCL: &str = "SCL";

    pub const LANDSAT_GREEN: &str = "green";
    pub const LANDSAT_RED: &str = "red";
    pub const LANDSAT_NIR: &str = "nir08";
    pub const LANDSAT_QA: &str = "qa_pixel";

    /// Landsat C2 `qa_pixel` cloud bit.
    pub const LANDSAT_CLOUD_BIT: u8 = 3;
}

/// Grid specification for testing.
#[derive(Debug, Clone, Copy)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    pub min_x: f64,
    pub max_y: f64,
    /// Square pixel size in CRS units.
    pub pixel_size: f64,
    pub epsg: u32,
}

impl GridSpec {
    /// A grid anchored at a UTM 33N origin with 10 m pixels.
    pub fn utm(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            min_x: 500_000.0,
            max_y: 4_200_000.0,
            pixel_size: 10.0,
            epsg: crs::UTM_33N,
        }
    }

    /// Returns the total number of grid cells.
    pub fn size(&self) -> usize {
        self.width * self.height
    }

    pub fn crs(&self) -> Crs {
        Crs::epsg(self.epsg)
    }

    pub fn extent(&self) -> Extent {
        Extent::new(
            self.min_x,
            self.max_y - self.height as f64 * self.pixel_size,
            self.min_x + self.width as f64 * self.pixel_size,
            self.max_y,
        )
    }

    /// The same grid shifted by whole pixels (positive `cols` east,
    /// positive `rows` south).
    pub fn shifted(&self, cols: i64, rows: i64) -> Self {
        Self {
            min_x: self.min_x + cols as f64 * self.pixel_size,
            max_y: self.max_y - rows as f64 * self.pixel_size,
            ..*self
        }
    }
}

/// Midnight UTC on a calendar date.
///
/// Panics on an invalid date; fixtures are static.
pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid fixture date {}-{}-{}", year, month, day))
}

/// `count` acquisition dates in one year, every `step_days` days from
/// January 5th.
pub fn scene_dates(year: i32, count: usize, step_days: i64) -> Vec<DateTime<Utc>> {
    let start = date(year, 1, 5);
    (0..count)
        .map(|i| start + chrono::Duration::days(step_days * i as i64))
        .collect()
}
