//! Lazy resolution of scene payloads.
//!
//! Catalog queries yield metadata-only records. A [`RasterResolver`] fetches
//! the pixels for one record; [`resolve_collection`] runs it over a whole
//! collection with bounded concurrency and an independent deadline per
//! record, dropping records that fail or time out.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::collection::{CollectionWarning, RasterCollection};
use crate::error::{RasterProcessorError, Result};
use crate::raster::Raster;
use crate::scene::SceneRecord;

/// Fetches the raster payload of a scene record.
#[async_trait]
pub trait RasterResolver: Send + Sync {
    /// Load the pixels for a pending record.
    async fn resolve(&self, record: &SceneRecord) -> Result<Raster>;
}

/// Resolve every pending record of a collection.
///
/// Concurrency and the per-record deadline come from the collection's
/// [`ProcessorConfig`](crate::config::ProcessorConfig).
pub async fn resolve_collection(
    collection: &RasterCollection,
    resolver: &dyn RasterResolver,
) -> RasterCollection {
    let config = collection.config();
    resolve_collection_with(
        collection,
        resolver,
        config.resolve_concurrency,
        config.resolve_timeout(),
    )
    .await
}

/// Resolve every pending record with explicit limits.
///
/// Already-resolved records pass through untouched. Output order follows
/// input order.
#[instrument(skip(collection, resolver), fields(records = collection.len()))]
pub async fn resolve_collection_with(
    collection: &RasterCollection,
    resolver: &dyn RasterResolver,
    concurrency: usize,
    deadline: Duration,
) -> RasterCollection {
    let outcomes: Vec<Result<SceneRecord>> = stream::iter(collection.iter())
        .map(|record| resolve_one(record, resolver, deadline))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut records = Vec::with_capacity(outcomes.len());
    let mut warnings = Vec::new();
    for (source, outcome) in collection.iter().zip(outcomes) {
        match outcome {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(record_id = %source.id(), error = %e, "Resolution failed, dropping record");
                warnings.push(CollectionWarning {
                    record_id: source.id().to_string(),
                    error: e,
                });
            }
        }
    }

    info!(
        resolved = records.len(),
        dropped = warnings.len(),
        "Collection resolved"
    );

    collection.derive(records, warnings)
}

async fn resolve_one(
    record: &SceneRecord,
    resolver: &dyn RasterResolver,
    deadline: Duration,
) -> Result<SceneRecord> {
    if record.is_resolved() {
        return Ok(record.clone());
    }

    match tokio::time::timeout(deadline, resolver.resolve(record)).await {
        Ok(Ok(raster)) => {
            debug!(record_id = %record.id(), width = raster.width(), height = raster.height(), "Resolved");
            Ok(record.clone().with_raster(raster))
        }
        Ok(Err(e)) if e.is_record_local() => Err(e),
        Ok(Err(e)) => Err(RasterProcessorError::resolution(record.id(), e)),
        Err(_) => Err(RasterProcessorError::Timeout {
            record_id: record.id().to_string(),
            seconds: deadline.as_secs(),
        }),
    }
}

/// Serves rasters from memory, keyed by asset href or record id.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    rasters: HashMap<String, Raster>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raster under an href or record id.
    pub fn with_raster(mut self, key: impl Into<String>, raster: Raster) -> Self {
        self.rasters.insert(key.into(), raster);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, raster: Raster) {
        self.rasters.insert(key.into(), raster);
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }
}

#[async_trait]
impl RasterResolver for StaticResolver {
    async fn resolve(&self, record: &SceneRecord) -> Result<Raster> {
        record
            .href()
            .and_then(|href| self.rasters.get(href))
            .or_else(|| self.rasters.get(record.id()))
            .cloned()
            .ok_or_else(|| RasterProcessorError::resolution(record.id(), "no raster registered"))
    }
}
