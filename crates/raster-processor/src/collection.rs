//! Ordered, schema-consistent collections of scene records.
//!
//! Collections are values: every operation returns a new collection and
//! leaves the receiver untouched. Per-record faults inside `map` and
//! `filter_by_predicate` drop the record and are kept as
//! [`CollectionWarning`]s on the result instead of aborting the operation.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Datelike, Utc};
use rayon::prelude::*;
use raster_common::{AttributeValue, Attributes, TimeRange};
use tracing::{debug, instrument, warn};

use crate::composite::{CompositeRaster, Compositor};
use crate::config::{CompositeConfig, ProcessorConfig};
use crate::error::{RasterProcessorError, Result};
use crate::raster::Raster;
use crate::scene::{SceneRecord, BUILTIN_FIELDS, FIELD_DATETIME, FIELD_ID, FIELD_PLATFORM};
use crate::types::ExtentPolicy;

/// A per-record fault that was recovered from by dropping the record.
#[derive(Debug, Clone)]
pub struct CollectionWarning {
    pub record_id: String,
    pub error: RasterProcessorError,
}

impl std::fmt::Display for CollectionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "record {} dropped: {}", self.record_id, self.error)
    }
}

/// Result of a per-record transform.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub raster: Raster,
    /// Replacement extension attributes; `None` keeps the record's own.
    pub attributes: Option<Attributes>,
}

impl TransformOutput {
    pub fn new(raster: Raster) -> Self {
        Self {
            raster,
            attributes: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// A per-record raster transform applied by [`RasterCollection::map`].
///
/// Implementations carry their parameters as fields (see [`crate::config`]).
/// Closures with the matching signature implement the trait as well.
pub trait SceneTransform: Send + Sync {
    fn apply(&self, record: &SceneRecord, raster: &Raster) -> Result<TransformOutput>;
}

impl<F> SceneTransform for F
where
    F: Fn(&SceneRecord, &Raster) -> Result<TransformOutput> + Send + Sync,
{
    fn apply(&self, record: &SceneRecord, raster: &Raster) -> Result<TransformOutput> {
        self(record, raster)
    }
}

/// Returns every raster unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl SceneTransform for Identity {
    fn apply(&self, _record: &SceneRecord, raster: &Raster) -> Result<TransformOutput> {
        Ok(TransformOutput::new(raster.clone()))
    }
}

/// An ordered sequence of scene records sharing one attribute schema.
#[derive(Debug, Clone, Default)]
pub struct RasterCollection {
    records: Vec<SceneRecord>,
    schema: BTreeSet<String>,
    warnings: Vec<CollectionWarning>,
    config: ProcessorConfig,
}

impl RasterCollection {
    /// An empty collection.
    pub fn empty() -> Self {
        Self::build(Vec::new(), Vec::new(), ProcessorConfig::default())
    }

    /// Wrap records in catalog order. Record ids must be unique.
    pub fn from_records(records: Vec<SceneRecord>) -> Result<Self> {
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.id()) {
                return Err(RasterProcessorError::DuplicateRecordId(
                    record.id().to_string(),
                ));
            }
        }
        Ok(Self::build(records, Vec::new(), ProcessorConfig::default()))
    }

    /// Build a collection from rasters and their attributes.
    ///
    /// The id comes from the `id` attribute (default `item-N`); the
    /// `datetime` attribute is required.
    pub fn from_rasters(items: Vec<(Raster, Attributes)>) -> Result<Self> {
        let records = items
            .into_iter()
            .enumerate()
            .map(|(idx, (raster, mut attributes))| {
                let id = attributes
                    .remove(FIELD_ID)
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| format!("item-{}", idx));
                let time = attributes
                    .remove(FIELD_DATETIME)
                    .and_then(|value| value.as_time())
                    .ok_or_else(|| RasterProcessorError::schema(FIELD_DATETIME))?;
                let platform = attributes
                    .remove(FIELD_PLATFORM)
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "unknown".to_string());

                let mut record = SceneRecord::from_raster(id, time, platform, raster);
                record.replace_properties(attributes)?;
                Ok(record)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_records(records)
    }

    /// Build a collection from labelled composites, e.g. one per year.
    ///
    /// Each record is stamped with the start of its composite's time range
    /// and carries `label_field`, `source_count` and `reduction` attributes.
    pub fn from_composites(
        label_field: &str,
        items: Vec<(AttributeValue, CompositeRaster)>,
    ) -> Result<Self> {
        let records = items
            .into_iter()
            .map(|(label, composite)| {
                let time = composite
                    .time_range
                    .map(|range| range.start)
                    .ok_or_else(|| {
                        RasterProcessorError::schema(format!("{} (composite {})", FIELD_DATETIME, label))
                    })?;
                let id = format!("composite-{}", label);
                SceneRecord::from_raster(id, time, "composite", composite.raster)
                    .with_attribute(label_field, label)?
                    .with_attribute("source_count", composite.source_count as i64)?
                    .with_attribute("reduction", composite.reduction.to_string())
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_records(records)
    }

    fn build(
        records: Vec<SceneRecord>,
        warnings: Vec<CollectionWarning>,
        config: ProcessorConfig,
    ) -> Self {
        let mut schema: BTreeSet<String> = BUILTIN_FIELDS.iter().map(|f| f.to_string()).collect();
        for record in &records {
            schema.extend(record.properties().keys().cloned());
        }
        Self {
            records,
            schema,
            warnings,
            config,
        }
    }

    /// A derived collection that inherits warnings and config.
    pub(crate) fn derive(&self, records: Vec<SceneRecord>, new_warnings: Vec<CollectionWarning>) -> Self {
        let mut warnings = self.warnings.clone();
        warnings.extend(new_warnings);
        Self::build(records, warnings, self.config.clone())
    }

    /// Use specific tiling/parallelism settings for derived operations.
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn with_warnings(mut self, warnings: Vec<CollectionWarning>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SceneRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[SceneRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SceneRecord> {
        self.records
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<&SceneRecord> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(SceneRecord::id).collect()
    }

    /// Attribute names shared by every record.
    pub fn schema(&self) -> &BTreeSet<String> {
        &self.schema
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.schema.contains(field)
    }

    /// Warnings accumulated by the operations that produced this collection.
    pub fn warnings(&self) -> &[CollectionWarning] {
        &self.warnings
    }

    fn require_field(&self, field: &str) -> Result<()> {
        if self.has_field(field) {
            Ok(())
        } else {
            Err(RasterProcessorError::schema(field))
        }
    }

    /// Acquisition times spanned by the records.
    pub fn time_range(&self) -> Option<TimeRange> {
        TimeRange::spanning(self.records.iter().map(SceneRecord::acquisition_time))
    }

    /// Keep records whose time attribute lies in `[start, end]`.
    ///
    /// Records with an absent or non-time value for `field` are dropped.
    pub fn filter_by_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        field: &str,
    ) -> Result<Self> {
        self.require_field(field)?;
        let range = TimeRange::new(start, end);
        let records = self
            .records
            .iter()
            .filter(|record| {
                record
                    .attribute(field)
                    .as_time()
                    .is_some_and(|t| range.contains(&t))
            })
            .cloned()
            .collect();
        Ok(self.derive(records, Vec::new()))
    }

    /// Keep records for which the predicate returns `Ok(true)`.
    ///
    /// A predicate error drops that record with a `Transform` warning and
    /// evaluation continues with the next record.
    pub fn filter_by_predicate<F, E>(&self, predicate: F) -> Self
    where
        F: Fn(&SceneRecord) -> std::result::Result<bool, E>,
        E: std::fmt::Display,
    {
        let mut records = Vec::new();
        let mut warnings = Vec::new();
        for record in &self.records {
            match predicate(record) {
                Ok(true) => records.push(record.clone()),
                Ok(false) => {}
                Err(e) => {
                    warn!(record_id = %record.id(), error = %e, "Predicate failed, dropping record");
                    warnings.push(CollectionWarning {
                        record_id: record.id().to_string(),
                        error: RasterProcessorError::transform(record.id(), e),
                    });
                }
            }
        }
        self.derive(records, warnings)
    }

    /// Keep records matching an infallible predicate.
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&SceneRecord) -> bool,
    {
        let records = self
            .records
            .iter()
            .filter(|record| predicate(record))
            .cloned()
            .collect();
        self.derive(records, Vec::new())
    }

    /// Apply a transform to every record's raster.
    ///
    /// Records whose transform fails, whose payload is unresolved, or whose
    /// new id collides with an earlier record are removed and reported as
    /// warnings. Output order follows input order.
    #[instrument(skip(self, transform), fields(records = self.records.len()))]
    pub fn map<T: SceneTransform + ?Sized>(&self, transform: &T) -> Self {
        let apply = |record: &SceneRecord| -> Result<SceneRecord> {
            let raster = record.raster()?;
            let output = transform
                .apply(record, raster)
                .map_err(|e| match e {
                    e if e.is_record_local() => e,
                    other => RasterProcessorError::transform(record.id(), other),
                })?;
            let mut mapped = record.clone().with_raster(output.raster);
            if let Some(attributes) = output.attributes {
                mapped.replace_properties(attributes)?;
            }
            Ok(mapped)
        };

        let results: Vec<Result<SceneRecord>> = if self.config.parallel {
            self.records.par_iter().map(apply).collect()
        } else {
            self.records.iter().map(apply).collect()
        };

        let mut records = Vec::with_capacity(results.len());
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        for (source, result) in self.records.iter().zip(results) {
            // A transform may rename a record; the first record keeps a
            // colliding id.
            let result = result.and_then(|record| {
                if seen.insert(record.id().to_string()) {
                    Ok(record)
                } else {
                    Err(RasterProcessorError::transform(
                        source.id(),
                        RasterProcessorError::DuplicateRecordId(record.id().to_string()),
                    ))
                }
            });
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(record_id = %source.id(), error = %e, "Transform failed, dropping record");
                    warnings.push(CollectionWarning {
                        record_id: source.id().to_string(),
                        error: e,
                    });
                }
            }
        }

        debug!(kept = records.len(), dropped = warnings.len(), "Map complete");
        self.derive(records, warnings)
    }

    /// Stable sort on one attribute. `Absent` values sort first ascending.
    pub fn sort_by(&self, field: &str, ascending: bool) -> Result<Self> {
        self.require_field(field)?;
        let mut keyed: Vec<(AttributeValue, &SceneRecord)> = self
            .records
            .iter()
            .map(|record| (record.attribute(field), record))
            .collect();
        if ascending {
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
        } else {
            keyed.sort_by(|a, b| b.0.cmp(&a.0));
        }
        let records = keyed.into_iter().map(|(_, record)| record.clone()).collect();
        Ok(self.derive(records, Vec::new()))
    }

    /// One attribute across all records, in collection order.
    ///
    /// Records without a value contribute `AttributeValue::Absent`.
    pub fn get_field_values(&self, field: &str) -> Result<Vec<AttributeValue>> {
        self.require_field(field)?;
        Ok(self
            .records
            .iter()
            .map(|record| record.attribute(field))
            .collect())
    }

    /// Occurrences of each distinct value of an attribute.
    pub fn value_counts(&self, field: &str) -> Result<BTreeMap<AttributeValue, usize>> {
        let mut counts = BTreeMap::new();
        for value in self.get_field_values(field)? {
            *counts.entry(value).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Bucket records by the calendar year of a time attribute.
    ///
    /// Records without a time value for `field` are left out.
    pub fn group_by_year(&self, field: &str) -> Result<BTreeMap<i32, RasterCollection>> {
        self.require_field(field)?;
        let mut buckets: BTreeMap<i32, Vec<SceneRecord>> = BTreeMap::new();
        for record in &self.records {
            match record.attribute(field).as_time() {
                Some(t) => buckets.entry(t.year()).or_default().push(record.clone()),
                None => debug!(record_id = %record.id(), field, "No time value, skipping"),
            }
        }
        Ok(buckets
            .into_iter()
            .map(|(year, records)| (year, Self::build(records, Vec::new(), self.config.clone())))
            .collect())
    }

    /// Temporal composite of all records.
    pub fn composite(&self, config: CompositeConfig) -> Result<CompositeRaster> {
        Compositor::new(config)
            .with_processor_config(self.config.clone())
            .composite(self)
    }

    /// Per-pixel temporal median.
    pub fn median(&self, ignore_nodata: bool, extent_policy: ExtentPolicy) -> Result<Raster> {
        self.composite(CompositeConfig::median(ignore_nodata, extent_policy))
            .map(|composite| composite.raster)
    }

    /// Per-pixel temporal mean.
    pub fn mean(&self, ignore_nodata: bool, extent_policy: ExtentPolicy) -> Result<Raster> {
        self.composite(CompositeConfig::mean(ignore_nodata, extent_policy))
            .map(|composite| composite.raster)
    }
}

impl<'a> IntoIterator for &'a RasterCollection {
    type Item = &'a SceneRecord;
    type IntoIter = std::slice::Iter<'a, SceneRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
