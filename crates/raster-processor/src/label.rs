//! Connected-component labeling of binary detection masks.
//!
//! Foreground is every valid, non-zero pixel; adjacency is 8-connected.
//! Rows are processed in strips (`ProcessorConfig::tile_rows`): each strip is
//! labeled on its own with a local union-find arena, strips are stitched
//! across their boundary rows, and final labels are handed out in row-major
//! first-encountered order. Strip size therefore never changes the output.

use std::collections::BTreeMap;

use rayon::prelude::*;
use raster_common::{Crs, Extent};
use tracing::{debug, instrument};

use crate::config::ProcessorConfig;
use crate::error::{RasterProcessorError, Result};
use crate::raster::{Band, Raster};
use crate::types::PixelSize;

/// Disjoint-set forest over dense `u32` ids.
#[derive(Debug, Default)]
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn with_capacity(n: usize) -> Self {
        Self {
            parent: Vec::with_capacity(n),
        }
    }

    fn make_set(&mut self) -> u32 {
        let id = self.parent.len() as u32;
        self.parent.push(id);
        id
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    /// Union keeping the smaller id as root.
    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra < rb {
            self.parent[rb as usize] = ra;
        } else if rb < ra {
            self.parent[ra as usize] = rb;
        }
    }
}

/// Labels of one strip: 0 background, 1..=count foreground.
struct StripLabels {
    labels: Vec<u32>,
    count: u32,
}

fn label_strip(foreground: &[bool], width: usize) -> StripLabels {
    let rows = foreground.len() / width;
    let mut provisional = vec![u32::MAX; foreground.len()];
    let mut sets = UnionFind::with_capacity(foreground.len() / 4 + 1);

    for row in 0..rows {
        for col in 0..width {
            let idx = row * width + col;
            if !foreground[idx] {
                continue;
            }

            // Already-visited neighbours: W, NW, N, NE.
            let mut neighbours = [u32::MAX; 4];
            if col > 0 {
                neighbours[0] = provisional[idx - 1];
            }
            if row > 0 {
                let up = idx - width;
                if col > 0 {
                    neighbours[1] = provisional[up - 1];
                }
                neighbours[2] = provisional[up];
                if col + 1 < width {
                    neighbours[3] = provisional[up + 1];
                }
            }

            let assigned = match neighbours.iter().copied().filter(|&n| n != u32::MAX).min() {
                Some(min) => {
                    for &n in neighbours.iter().filter(|&&n| n != u32::MAX && n != min) {
                        sets.union(min, n);
                    }
                    min
                }
                None => sets.make_set(),
            };
            provisional[idx] = assigned;
        }
    }

    let mut compact: Vec<u32> = vec![0; sets.parent.len()];
    let mut count = 0u32;
    let labels = provisional
        .iter()
        .map(|&p| {
            if p == u32::MAX {
                return 0;
            }
            let root = sets.find(p) as usize;
            if compact[root] == 0 {
                count += 1;
                compact[root] = count;
            }
            compact[root]
        })
        .collect();

    StripLabels { labels, count }
}

/// Labels connected foreground regions of a binary raster.
#[derive(Debug, Clone, Default)]
pub struct RegionLabeler {
    config: ProcessorConfig,
}

impl RegionLabeler {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }

    /// Label the raster's only band.
    pub fn label(&self, mask: &Raster) -> Result<LabeledRegions> {
        match mask.bands() {
            [band] => self.label_band(mask, band.name()),
            bands => Err(RasterProcessorError::invalid_band(format!(
                "expected a single-band mask, got {} bands; use label_band",
                bands.len()
            ))),
        }
    }

    /// Label one named band of the raster.
    #[instrument(skip(self, mask), fields(width = mask.width(), height = mask.height()))]
    pub fn label_band(&self, mask: &Raster, band: &str) -> Result<LabeledRegions> {
        let band = mask.band(band)?;
        let (width, height) = mask.shape();
        let foreground: Vec<bool> = (0..band.len())
            .map(|idx| band.valid_value(idx).is_some_and(|v| v != 0.0))
            .collect();

        let strip_len = self.config.tile_rows.max(1) * width;
        let strips: Vec<StripLabels> = if self.config.parallel {
            foreground
                .par_chunks(strip_len)
                .map(|strip| label_strip(strip, width))
                .collect()
        } else {
            foreground
                .chunks(strip_len)
                .map(|strip| label_strip(strip, width))
                .collect()
        };

        let labels = stitch_strips(&strips, width);
        let regions = LabeledRegions::from_labels(
            labels,
            width,
            height,
            mask.crs().clone(),
            *mask.extent(),
        );
        debug!(
            strips = strips.len(),
            regions = regions.num_labels(),
            "Labeled regions"
        );
        Ok(regions)
    }
}

/// Merge strip-local labels into global row-major labels.
fn stitch_strips(strips: &[StripLabels], width: usize) -> Vec<u32> {
    // Global ids: strip offset + local label; id 0 stays background.
    let total: u32 = strips.iter().map(|s| s.count).sum();
    let mut sets = UnionFind::with_capacity(total as usize + 1);
    for _ in 0..=total {
        sets.make_set();
    }

    let mut offsets = Vec::with_capacity(strips.len());
    let mut offset = 0u32;
    for strip in strips {
        offsets.push(offset);
        offset += strip.count;
    }

    for (i, pair) in strips.windows(2).enumerate() {
        let (upper, lower) = (&pair[0], &pair[1]);
        let above = &upper.labels[upper.labels.len() - width..];
        let below = &lower.labels[..width];
        for col in 0..width {
            if below[col] == 0 {
                continue;
            }
            let lo = col.saturating_sub(1);
            let hi = (col + 1).min(width - 1);
            for &up in &above[lo..=hi] {
                if up != 0 {
                    sets.union(offsets[i] + up, offsets[i + 1] + below[col]);
                }
            }
        }
    }

    let mut relabel = vec![0u32; total as usize + 1];
    let mut next = 0u32;
    strips
        .iter()
        .zip(&offsets)
        .flat_map(|(strip, &offset)| strip.labels.iter().map(move |&l| (l, offset)))
        .map(|(local, offset)| {
            if local == 0 {
                return 0;
            }
            let root = sets.find(offset + local) as usize;
            if relabel[root] == 0 {
                next += 1;
                relabel[root] = next;
            }
            relabel[root]
        })
        .collect()
}

/// Output of region labeling: one label per pixel (0 = background) and a
/// pixel count per label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRegions {
    width: usize,
    height: usize,
    labels: Vec<u32>,
    counts: Vec<usize>,
    crs: Crs,
    extent: Extent,
}

impl LabeledRegions {
    fn from_labels(labels: Vec<u32>, width: usize, height: usize, crs: Crs, extent: Extent) -> Self {
        let num = labels.iter().copied().max().unwrap_or(0) as usize;
        let mut counts = vec![0usize; num];
        for &label in labels.iter().filter(|&&l| l != 0) {
            counts[label as usize - 1] += 1;
        }
        Self {
            width,
            height,
            labels,
            counts,
            crs,
            extent,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major label grid.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Label at a pixel, `None` outside the grid.
    pub fn label_at(&self, row: usize, col: usize) -> Option<u32> {
        (row < self.height && col < self.width).then(|| self.labels[row * self.width + col])
    }

    pub fn num_labels(&self) -> usize {
        self.counts.len()
    }

    /// Pixels in a region; 0 for background or unknown labels.
    pub fn pixel_count(&self, label: u32) -> usize {
        match label {
            0 => 0,
            l => self.counts.get(l as usize - 1).copied().unwrap_or(0),
        }
    }

    /// Label to pixel count, ascending by label. Empty when nothing is
    /// foreground.
    pub fn counts(&self) -> BTreeMap<u32, usize> {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &count)| (i as u32 + 1, count))
            .collect()
    }

    /// Ground area of a region: pixel count times pixel area.
    pub fn area(&self, label: u32, pixel_size: PixelSize) -> f64 {
        self.pixel_count(label) as f64 * pixel_size.area()
    }

    /// Ground area of all foreground regions.
    pub fn total_area(&self, pixel_size: PixelSize) -> f64 {
        self.counts.iter().sum::<usize>() as f64 * pixel_size.area()
    }

    /// Largest region as `(label, pixel_count)`; ties go to the lower label.
    pub fn largest(&self) -> Option<(u32, usize)> {
        self.counts
            .iter()
            .enumerate()
            .fold(None, |best: Option<(u32, usize)>, (i, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((i as u32 + 1, count)),
            })
    }

    /// The label grid as a single-band raster on the input grid.
    pub fn to_raster(&self, band_name: &str) -> Result<Raster> {
        let data = self.labels.iter().map(|&l| l as f32).collect();
        Raster::new(
            self.width,
            self.height,
            vec![Band::new(band_name, data)],
            self.crs.clone(),
            self.extent,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(width: usize, height: usize, data: Vec<f32>) -> Raster {
        Raster::single_band(
            "water",
            width,
            height,
            data,
            Crs::epsg(32633),
            Extent::new(0.0, 0.0, width as f64 * 10.0, height as f64 * 10.0),
        )
        .unwrap()
    }

    fn labeler(tile_rows: usize) -> RegionLabeler {
        RegionLabeler::new(ProcessorConfig {
            tile_rows,
            ..ProcessorConfig::default()
        })
    }

    #[test]
    fn test_diagonal_pair_is_one_region() {
        let data = vec![
            1.0, 0.0,
            0.0, 1.0,
        ];
        let regions = labeler(256).label(&mask(2, 2, data)).unwrap();
        assert_eq!(regions.num_labels(), 1);
        assert_eq!(regions.pixel_count(1), 2);
        assert_eq!(regions.label_at(1, 1), Some(1));
    }

    #[test]
    fn test_all_background_yields_no_labels() {
        let regions = labeler(256).label(&mask(10, 10, vec![0.0; 100])).unwrap();
        assert_eq!(regions.num_labels(), 0);
        assert!(regions.counts().is_empty());
        assert_eq!(regions.largest(), None);
        assert_eq!(regions.total_area(PixelSize::square(10.0)), 0.0);
    }

    #[test]
    fn test_row_major_label_order() {
        let data = vec![
            0.0, 0.0, 0.0, 1.0,
            1.0, 0.0, 0.0, 0.0,
            1.0, 0.0, 1.0, 1.0,
        ];
        let regions = labeler(256).label(&mask(4, 3, data)).unwrap();
        assert_eq!(regions.num_labels(), 3);
        assert_eq!(regions.label_at(0, 3), Some(1));
        assert_eq!(regions.label_at(1, 0), Some(2));
        assert_eq!(regions.label_at(2, 2), Some(3));
        assert_eq!(regions.counts(), BTreeMap::from([(1, 1), (2, 2), (3, 2)]));
        assert_eq!(regions.largest(), Some((2, 2)));
        assert_eq!(regions.area(3, PixelSize::square(10.0)), 200.0);
    }

    #[test]
    fn test_nodata_is_background() {
        let raster = Raster::new(
            3,
            1,
            vec![Band::new("water", vec![1.0, -1.0, 1.0]).with_nodata(-1.0)],
            Crs::epsg(32633),
            Extent::new(0.0, 0.0, 30.0, 10.0),
        )
        .unwrap();
        let regions = labeler(256).label(&raster).unwrap();
        assert_eq!(regions.num_labels(), 2);
        assert_eq!(regions.label_at(0, 1), Some(0));
    }

    #[test]
    fn test_u_shape_merges_late() {
        // The two arms only join on the last row.
        let data = vec![
            1.0, 0.0, 1.0,
            1.0, 0.0, 1.0,
            1.0, 1.0, 1.0,
        ];
        for tile_rows in [1, 2, 256] {
            let regions = labeler(tile_rows).label(&mask(3, 3, data.clone())).unwrap();
            assert_eq!(regions.num_labels(), 1, "tile_rows = {}", tile_rows);
            assert_eq!(regions.pixel_count(1), 7);
        }
    }

    #[test]
    fn test_tiling_matches_untiled() {
        // Diagonal stripes crossing every strip boundary plus isolated dots.
        let (width, height) = (17, 23);
        let data: Vec<f32> = (0..width * height)
            .map(|i| {
                let (row, col) = (i / width, i % width);
                if (row + col) % 7 == 0 || (row * 3 + col * 5) % 11 == 0 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let raster = mask(width, height, data);

        let reference = labeler(height).label(&raster).unwrap();
        for tile_rows in [1, 2, 3, 5, 8] {
            let tiled = labeler(tile_rows).label(&raster).unwrap();
            assert_eq!(tiled.labels(), reference.labels(), "tile_rows = {}", tile_rows);
        }
    }

    #[test]
    fn test_to_raster() {
        let regions = labeler(256)
            .label(&mask(3, 1, vec![1.0, 0.0, 1.0]))
            .unwrap();
        let raster = regions.to_raster("label").unwrap();
        assert_eq!(raster.band("label").unwrap().data(), &[1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_multi_band_requires_name() {
        let raster = Raster::new(
            1,
            1,
            vec![Band::new("a", vec![1.0]), Band::new("b", vec![0.0])],
            Crs::epsg(32633),
            Extent::new(0.0, 0.0, 1.0, 1.0),
        )
        .unwrap();
        assert!(labeler(256).label(&raster).is_err());
        assert_eq!(labeler(256).label_band(&raster, "a").unwrap().num_labels(), 1);
    }
}
