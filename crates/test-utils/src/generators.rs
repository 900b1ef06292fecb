//! Test data generators for synthetic scene bands.
//!
//! These generators create predictable, verifiable pixel patterns that can
//! be used across the test suite. All grids are row-major.

/// Creates a test grid with predictable values.
///
/// Each cell value is `col * 1000 + row`, so a misplaced pixel is easy to
/// spot by value alone.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);  // col=1, row=0
/// assert_eq!(grid[10], 1.0);    // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    (0..height)
        .flat_map(|row| (0..width).map(move |col| (col * 1000 + row) as f32))
        .collect()
}

/// Creates a surface reflectance band in `[0, 1]`.
///
/// Values ramp gently from `base` across the grid so that neighbouring
/// scenes built with different bases never tie.
pub fn create_reflectance_grid(width: usize, height: usize, base: f32) -> Vec<f32> {
    let span = (width * height).max(1) as f32;
    (0..width * height)
        .map(|idx| (base + 0.1 * idx as f32 / span).clamp(0.0, 1.0))
        .collect()
}

/// Creates a grid filled with one value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid holding `fill` everywhere except `value` at the given
/// `(col, row)` positions. Out-of-range positions are ignored.
pub fn create_grid_with_values(
    width: usize,
    height: usize,
    fill: f32,
    value: f32,
    positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![fill; width * height];
    for &(col, row) in positions {
        if col < width && row < height {
            data[row * width + col] = value;
        }
    }
    data
}

/// Creates a grid with NaN at the given `(col, row)` positions, zero
/// elsewhere.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    create_grid_with_values(width, height, 0.0, f32::NAN, nan_positions)
}

/// Creates a bit-encoded QA band with the given bits set on every pixel.
///
/// # Example
///
/// ```
/// use test_utils::create_qa_grid;
///
/// // Landsat C2 cloud (bit 3) over the whole scene
/// let qa = create_qa_grid(4, 4, &[3]);
/// assert!(qa.iter().all(|&v| v == 8.0));
/// ```
pub fn create_qa_grid(width: usize, height: usize, bits: &[u8]) -> Vec<f32> {
    let word = bits.iter().fold(0u32, |acc, &bit| acc | (1u32 << bit));
    vec![word as f32; width * height]
}

/// Creates a QA band with `bits` set only inside the rectangle
/// `[col0, col1) x [row0, row1)`.
pub fn create_partial_qa_grid(
    width: usize,
    height: usize,
    bits: &[u8],
    cols: std::ops::Range<usize>,
    rows: std::ops::Range<usize>,
) -> Vec<f32> {
    let word = bits.iter().fold(0u32, |acc, &bit| acc | (1u32 << bit)) as f32;
    (0..height)
        .flat_map(|row| {
            let cols = cols.clone();
            let rows = rows.clone();
            (0..width).map(move |col| {
                if cols.contains(&col) && rows.contains(&row) {
                    word
                } else {
                    0.0
                }
            })
        })
        .collect()
}

/// Creates a binary detection mask from an ASCII picture.
///
/// `#` is foreground (1.0), `.` background (0.0) and `?` nodata (NaN).
/// Rows must be of equal length.
///
/// # Example
///
/// ```
/// use test_utils::create_mask_from_ascii;
///
/// let (width, height, data) = create_mask_from_ascii(&["#.", ".#"]);
/// assert_eq!((width, height), (2, 2));
/// assert_eq!(data, vec![1.0, 0.0, 0.0, 1.0]);
/// ```
pub fn create_mask_from_ascii(rows: &[&str]) -> (usize, usize, Vec<f32>) {
    let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
    let data = rows
        .iter()
        .flat_map(|row| {
            assert_eq!(row.chars().count(), width, "ragged mask picture");
            row.chars().map(|c| match c {
                '#' => 1.0,
                '?' => f32::NAN,
                _ => 0.0,
            })
        })
        .collect();
    (width, rows.len(), data)
}

/// Creates a water-body style mask: a filled disc of `radius` pixels
/// centred at `(cx, cy)`.
pub fn create_disc_mask(width: usize, height: usize, cx: f64, cy: f64, radius: f64) -> Vec<f32> {
    (0..height)
        .flat_map(|row| {
            (0..width).map(move |col| {
                let dx = col as f64 + 0.5 - cx;
                let dy = row as f64 + 0.5 - cy;
                if dx * dx + dy * dy <= radius * radius {
                    1.0
                } else {
                    0.0
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(3, 2);
        assert_eq!(grid, vec![0.0, 1000.0, 2000.0, 1.0, 1001.0, 2001.0]);
    }

    #[test]
    fn test_reflectance_stays_in_range() {
        let grid = create_reflectance_grid(8, 8, 0.95);
        assert!(grid.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(grid[0], 0.95);
    }

    #[test]
    fn test_partial_qa_grid() {
        let qa = create_partial_qa_grid(3, 2, &[1, 4], 1..3, 0..1);
        assert_eq!(qa, vec![0.0, 18.0, 18.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_grid_with_nans() {
        let grid = create_grid_with_nans(2, 2, &[(1, 0), (5, 5)]);
        assert!(grid[1].is_nan());
        assert_eq!(grid.iter().filter(|v| v.is_nan()).count(), 1);
    }

    #[test]
    fn test_disc_mask_is_symmetric() {
        let mask = create_disc_mask(5, 5, 2.5, 2.5, 1.6);
        let foreground = mask.iter().filter(|&&v| v == 1.0).count();
        assert_eq!(foreground, 9);
    }
}
