//! Multidimensional cubes: co-registered rasters stacked along one named
//! dimension (typically time or year).

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::collection::RasterCollection;
use crate::error::{RasterProcessorError, Result};
use crate::raster::Raster;
use crate::scene::SceneRecord;

/// How the builder treats the order of incoming dimension values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionOrdering {
    /// Sort slices by dimension value.
    #[default]
    Sort,
    /// Keep input order; it must already be strictly increasing.
    TrustSorted,
}

/// Assembles a [`MultidimensionalCube`] from `(dimension value, raster)`
/// pairs.
#[derive(Debug, Clone)]
pub struct CubeBuilder {
    dimension_name: String,
    variable_name: String,
    ordering: DimensionOrdering,
}

impl CubeBuilder {
    pub fn new(dimension_name: impl Into<String>, variable_name: impl Into<String>) -> Self {
        Self {
            dimension_name: dimension_name.into(),
            variable_name: variable_name.into(),
            ordering: DimensionOrdering::default(),
        }
    }

    pub fn with_ordering(mut self, ordering: DimensionOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Validate and stack the slices.
    ///
    /// Every raster must match the first one in shape, CRS, extent and band
    /// names; the first offender fails with `ShapeMismatch` naming its
    /// dimension value.
    #[instrument(skip(self, slices), fields(dimension = %self.dimension_name, variable = %self.variable_name))]
    pub fn build<K, I>(&self, slices: I) -> Result<MultidimensionalCube<K>>
    where
        K: Ord + Clone + Hash + Display,
        I: IntoIterator<Item = (K, Raster)>,
    {
        let mut slices: Vec<(K, Raster)> = slices.into_iter().collect();
        let Some((_, reference)) = slices.first() else {
            return Err(RasterProcessorError::EmptyCube);
        };

        let expected = grid_signature(reference);
        for (key, raster) in slices.iter().skip(1) {
            if !raster.same_grid(reference) || raster.band_names() != reference.band_names() {
                return Err(RasterProcessorError::ShapeMismatch {
                    dimension_value: key.to_string(),
                    expected,
                    found: grid_signature(raster),
                });
            }
        }

        match self.ordering {
            DimensionOrdering::Sort => slices.sort_by(|a, b| a.0.cmp(&b.0)),
            DimensionOrdering::TrustSorted => {
                if let Some(pair) = slices.windows(2).find(|pair| pair[0].0 > pair[1].0) {
                    return Err(RasterProcessorError::UnorderedDimension(pair[1].0.to_string()));
                }
            }
        }

        let mut index = HashMap::with_capacity(slices.len());
        for (position, (key, _)) in slices.iter().enumerate() {
            if index.insert(key.clone(), position).is_some() {
                return Err(RasterProcessorError::DuplicateDimensionValue(key.to_string()));
            }
        }

        let (keys, rasters): (Vec<K>, Vec<Raster>) = slices.into_iter().unzip();
        debug!(slices = keys.len(), "Cube assembled");
        Ok(MultidimensionalCube {
            dimension_name: self.dimension_name.clone(),
            variable_name: self.variable_name.clone(),
            keys,
            rasters,
            index,
        })
    }

    /// Stack the resolved rasters of a collection, keyed per record.
    pub fn build_from_collection<K, F>(
        &self,
        collection: &RasterCollection,
        key: F,
    ) -> Result<MultidimensionalCube<K>>
    where
        K: Ord + Clone + Hash + Display,
        F: Fn(&SceneRecord) -> K,
    {
        let slices = collection
            .iter()
            .map(|record| Ok((key(record), record.raster()?.clone())))
            .collect::<Result<Vec<_>>>()?;
        self.build(slices)
    }
}

fn grid_signature(raster: &Raster) -> String {
    format!(
        "{}x{} {} [{}] bands {:?}",
        raster.width(),
        raster.height(),
        raster.crs(),
        raster.extent(),
        raster.band_names()
    )
}

/// Rasters on one grid indexed by a dimension value, with O(1) slice lookup.
#[derive(Clone)]
pub struct MultidimensionalCube<K> {
    dimension_name: String,
    variable_name: String,
    keys: Vec<K>,
    rasters: Vec<Raster>,
    index: HashMap<K, usize>,
}

impl<K> MultidimensionalCube<K>
where
    K: Ord + Clone + Hash + Display,
{
    pub fn dimension_name(&self) -> &str {
        &self.dimension_name
    }

    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    /// Dimension values in cube order.
    pub fn dimension_values(&self) -> &[K] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Slice for a dimension value.
    pub fn slice(&self, key: &K) -> Option<&Raster> {
        self.index.get(key).map(|&i| &self.rasters[i])
    }

    /// Slice by position along the dimension.
    pub fn slice_at(&self, position: usize) -> Option<(&K, &Raster)> {
        self.keys.get(position).zip(self.rasters.get(position))
    }

    /// Position of a dimension value.
    pub fn position(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Grid shared by all slices.
    pub fn template(&self) -> &Raster {
        &self.rasters[0]
    }

    /// One pixel through the whole dimension: one value per slice, `None`
    /// where the pixel is nodata.
    pub fn pixel_series(&self, band: &str, row: usize, col: usize) -> Result<Vec<Option<f32>>> {
        self.rasters
            .iter()
            .map(|raster| raster.get(band, row, col))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Raster)> {
        self.keys.iter().zip(self.rasters.iter())
    }
}

impl<K: Debug> Debug for MultidimensionalCube<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultidimensionalCube")
            .field("dimension_name", &self.dimension_name)
            .field("variable_name", &self.variable_name)
            .field("keys", &self.keys)
            .finish()
    }
}
