//! Catalog collaborator interface.
//!
//! A catalog turns a structured query into metadata-only scene records.
//! Transport and pagination belong to concrete catalog clients; this module
//! defines the query model, attribute projection, and an in-memory catalog
//! that evaluates queries locally.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use raster_common::time::parse_datetime;
use raster_common::{AttributeValue, Extent, TimeRange};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::collection::{CollectionWarning, RasterCollection};
use crate::error::{RasterProcessorError, Result};
use crate::scene::{SceneRecord, FIELD_CLOUD_COVER, FIELD_CRS};

/// Attribute carrying the catalog collection id of a record.
pub const FIELD_COLLECTION: &str = "collection";

const STAC_CLOUD_COVER: &str = "eo:cloud_cover";

/// Comparison operator of a property filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
}

impl FilterOp {
    /// Parse a short (`lt`) or long (`lessthan`) operator name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lt" | "lessthan" => Some(Self::Lt),
            "lte" | "lessthanequals" => Some(Self::Lte),
            "gt" | "greaterthan" => Some(Self::Gt),
            "gte" | "greaterthanequals" => Some(Self::Gte),
            "eq" | "equals" => Some(Self::Eq),
            "neq" | "notequals" => Some(Self::Neq),
            _ => None,
        }
    }

    /// Short operator name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Eq => "eq",
            Self::Neq => "neq",
        }
    }

    pub fn evaluate(&self, left: &AttributeValue, right: &AttributeValue) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Lte => left <= right,
            Self::Gt => left > right,
            Self::Gte => left >= right,
            Self::Eq => left == right,
            Self::Neq => left != right,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map catalog-specific field spellings onto record attribute names.
pub fn canonical_field(field: &str) -> &str {
    match field.to_lowercase().as_str() {
        "cloudcover" | STAC_CLOUD_COVER => FIELD_CLOUD_COVER,
        _ => field,
    }
}

/// One metadata predicate, e.g. `cloud_cover lt 10`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: AttributeValue,
}

impl PropertyFilter {
    pub fn new(field: &str, op: FilterOp, value: impl Into<AttributeValue>) -> Self {
        Self {
            field: canonical_field(field).to_string(),
            op,
            value: value.into(),
        }
    }

    /// Records lacking the field never match. Cloud cover falls back to
    /// the unprojected STAC property.
    pub fn matches(&self, record: &SceneRecord) -> bool {
        let mut actual = record.attribute(&self.field);
        if actual.is_absent() && self.field == FIELD_CLOUD_COVER {
            actual = record.attribute(STAC_CLOUD_COVER);
        }
        !actual.is_absent() && self.op.evaluate(&actual, &self.value)
    }
}

/// Parse a filter literal: JSON scalars first, then timestamps, then text.
fn parse_literal(token: &str) -> AttributeValue {
    match serde_json::from_str::<serde_json::Value>(token) {
        Ok(value) if !value.is_array() && !value.is_object() => {
            let parsed = AttributeValue::from_json(&value);
            match parsed.as_str().map(parse_datetime) {
                Some(Ok(time)) => AttributeValue::Time(time),
                _ => parsed,
            }
        }
        _ => parse_datetime(token)
            .map(AttributeValue::Time)
            .unwrap_or_else(|_| AttributeValue::Text(token.to_string())),
    }
}

impl FromStr for PropertyFilter {
    type Err = RasterProcessorError;

    /// Parse `"<field> <op> <value>"`; tokens may be quoted.
    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| c == '\'' || c == '"'))
            .collect();
        let [field, op, value] = tokens.as_slice() else {
            return Err(RasterProcessorError::Catalog(format!(
                "filter '{}' must be '<field> <op> <value>'",
                s
            )));
        };
        let op = FilterOp::from_str(op).ok_or_else(|| {
            RasterProcessorError::Catalog(format!("unknown filter operator '{}'", op))
        })?;
        Ok(Self::new(field, op, parse_literal(value)))
    }
}

/// A structured catalog search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// Collection ids to search; empty searches all.
    pub collections: Vec<String>,

    /// Footprint filter, in the CRS of the catalog's record extents.
    pub bbox: Option<Extent>,

    /// Inclusive acquisition time window.
    pub time_range: Option<TimeRange>,

    /// Metadata predicates, all of which must hold.
    pub filters: Vec<PropertyFilter>,

    /// Maximum number of records; `None` returns every match.
    pub limit: Option<usize>,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, id: impl Into<String>) -> Self {
        self.collections.push(id.into());
        self
    }

    pub fn bbox(mut self, bbox: Extent) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn filter(mut self, filter: PropertyFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Limit the result count. Zero means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Whether a record satisfies every criterion except the limit.
    pub fn matches(&self, record: &SceneRecord) -> bool {
        let in_collection = self.collections.is_empty()
            || record
                .attribute(FIELD_COLLECTION)
                .as_str()
                .is_some_and(|c| self.collections.iter().any(|wanted| wanted == c));
        let in_bbox = self
            .bbox
            .map_or(true, |bbox| bbox.intersects(record.extent()));
        let in_time = self
            .time_range
            .map_or(true, |range| range.contains(&record.acquisition_time()));

        in_collection && in_bbox && in_time && self.filters.iter().all(|f| f.matches(record))
    }
}

/// Renames catalog attributes onto the names the collection works with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeProjection {
    renames: BTreeMap<String, String>,
}

impl AttributeProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// STAC extension names mapped onto the built-in fields.
    pub fn stac() -> Self {
        Self::new()
            .rename(STAC_CLOUD_COVER, FIELD_CLOUD_COVER)
            .rename("proj:epsg", FIELD_CRS)
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Apply the renames to one record's extension properties.
    pub fn apply(&self, record: &SceneRecord) -> Result<SceneRecord> {
        let mut properties = record.properties().clone();
        let moved: Vec<(&str, AttributeValue)> = self
            .renames
            .iter()
            .filter_map(|(from, to)| properties.remove(from).map(|v| (to.as_str(), v)))
            .collect();

        let mut projected = record.clone();
        projected.replace_properties(properties)?;
        for (to, value) in moved {
            projected.set_attribute(to, value)?;
        }
        Ok(projected)
    }
}

/// A searchable source of scene records.
#[async_trait]
pub trait SceneCatalog: Send + Sync {
    /// Records matching the query, in catalog order.
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<SceneRecord>>;
}

/// Catalog over records held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    records: Vec<SceneRecord>,
}

impl InMemoryCatalog {
    pub fn new(records: Vec<SceneRecord>) -> Self {
        Self { records }
    }

    pub fn push(&mut self, record: SceneRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SceneCatalog for InMemoryCatalog {
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<SceneRecord>> {
        let matches: Vec<SceneRecord> = self
            .records
            .iter()
            .filter(|record| query.matches(record))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        debug!(total = self.records.len(), matched = matches.len(), "In-memory search");
        Ok(matches)
    }
}

impl RasterCollection {
    /// Query a catalog and wrap the results.
    ///
    /// A record whose attributes cannot be projected is dropped with a
    /// warning; the rest of the result set is kept.
    #[instrument(skip(catalog, query, projection), fields(collections = ?query.collections))]
    pub async fn from_catalog(
        catalog: &dyn SceneCatalog,
        query: &CatalogQuery,
        projection: &AttributeProjection,
    ) -> Result<RasterCollection> {
        let found = catalog.search(query).await?;

        let mut records = Vec::with_capacity(found.len());
        let mut warnings = Vec::new();
        for record in &found {
            match projection.apply(record) {
                Ok(projected) => records.push(projected),
                Err(e) => {
                    warn!(record_id = %record.id(), error = %e, "Dropping unprojectable record");
                    warnings.push(CollectionWarning {
                        record_id: record.id().to_string(),
                        error: e,
                    });
                }
            }
        }

        info!(records = records.len(), dropped = warnings.len(), "Catalog query complete");
        Ok(RasterCollection::from_records(records)?.with_warnings(warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::FIELD_PLATFORM;
    use raster_common::{Crs, Extent};

    fn record(id: &str, date: &str, cloud: f64, collection: &str) -> SceneRecord {
        SceneRecord::new(
            id,
            parse_datetime(date).unwrap(),
            "sentinel-2a",
            Crs::epsg(32633),
            Extent::new(0.0, 0.0, 100.0, 100.0),
        )
        .with_attribute("eo:cloud_cover", cloud)
        .unwrap()
        .with_attribute(FIELD_COLLECTION, collection)
        .unwrap()
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            record("a", "2021-01-10", 5.0, "sentinel-2-l2a"),
            record("b", "2021-02-10", 60.0, "sentinel-2-l2a"),
            record("c", "2021-03-10", 2.0, "landsat-c2-l2"),
            record("d", "2022-01-10", 8.0, "sentinel-2-l2a"),
        ])
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(FilterOp::from_str("lessthan"), Some(FilterOp::Lt));
        assert_eq!(FilterOp::from_str("LTE"), Some(FilterOp::Lte));
        assert_eq!(FilterOp::from_str("notequals"), Some(FilterOp::Neq));
        assert_eq!(FilterOp::from_str("between"), None);
    }

    #[test]
    fn test_parse_filter_with_alias() {
        let filter: PropertyFilter = "'cloudcover' 'lessthan' '10'".parse().unwrap();
        assert_eq!(filter.field, FIELD_CLOUD_COVER);
        assert_eq!(filter.op, FilterOp::Lt);
        assert_eq!(filter.value, AttributeValue::Integer(10));

        let filter: PropertyFilter = "platform eq landsat-8".parse().unwrap();
        assert_eq!(filter.value, AttributeValue::from("landsat-8"));

        assert!("cloudcover lt".parse::<PropertyFilter>().is_err());
        assert!("cloudcover within 10".parse::<PropertyFilter>().is_err());
    }

    #[test]
    fn test_projection_moves_attributes() {
        let projected = AttributeProjection::stac()
            .apply(&record("a", "2021-01-10", 5.0, "s2"))
            .unwrap();
        assert_eq!(projected.cloud_cover(), Some(5.0));
        assert!(projected.attribute("eo:cloud_cover").is_absent());
        assert_eq!(projected.attribute(FIELD_COLLECTION), AttributeValue::from("s2"));
    }

    #[tokio::test]
    async fn test_from_catalog_applies_query() {
        let query = CatalogQuery::new()
            .collection("sentinel-2-l2a")
            .time_range(TimeRange::year(2021).unwrap())
            .filter("cloudcover lt 10".parse().unwrap());
        let collection =
            RasterCollection::from_catalog(&catalog(), &query, &AttributeProjection::stac())
                .await
                .unwrap();
        assert_eq!(collection.ids(), vec!["a"]);
        assert_eq!(
            collection.get_field_values(FIELD_PLATFORM).unwrap(),
            vec![AttributeValue::from("sentinel-2a")]
        );
    }

    #[tokio::test]
    async fn test_limit_and_bbox() {
        let all = catalog()
            .search(&CatalogQuery::new().limit(0))
            .await
            .unwrap();
        assert_eq!(all.len(), 4);

        let limited = catalog().search(&CatalogQuery::new().limit(2)).await.unwrap();
        assert_eq!(
            limited.iter().map(SceneRecord::id).collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        let outside = catalog()
            .search(&CatalogQuery::new().bbox(Extent::new(500.0, 500.0, 600.0, 600.0)))
            .await
            .unwrap();
        assert!(outside.is_empty());
    }
}
