//! Catalog query, lazy resolution and collection operations together.

use std::time::Duration;

use async_trait::async_trait;
use raster_processor::{
    resolve_collection, resolve_collection_with, AttributeProjection, AttributeValue, Band,
    CatalogQuery, ClassMaskConfig, ClassMasker, ExtentPolicy, InMemoryCatalog, PropertyFilter,
    Raster, RasterCollection, RasterProcessorError, RasterResolver, SceneRecord, StaticResolver,
    TimeRange,
};
use test_utils::{bands, create_constant_grid, create_grid_with_values, date, init_tracing, GridSpec};

const SIZE: usize = 4;

fn s2_record(id: &str, day: u32, cloud: f64, platform: &str) -> SceneRecord {
    let spec = GridSpec::utm(SIZE, SIZE);
    SceneRecord::new(id, date(2021, 7, day), platform, spec.crs(), spec.extent())
        .with_href(format!("s3://sentinel-cogs/{}.tif", id))
        .with_attribute("eo:cloud_cover", cloud)
        .unwrap()
        .with_attribute("collection", "sentinel-2-l2a")
        .unwrap()
        .with_attribute("s2:mgrs_tile", "33PTM")
        .unwrap()
}

fn s2_raster(red: f32, scl: Vec<f32>) -> Raster {
    let spec = GridSpec::utm(SIZE, SIZE);
    Raster::new(
        SIZE,
        SIZE,
        vec![
            Band::new(bands::S2_RED, create_constant_grid(SIZE, SIZE, red)),
            Band::new(bands::S2_SCL, scl),
        ],
        spec.crs(),
        spec.extent(),
    )
    .unwrap()
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(vec![
        s2_record("S2A_20210701", 1, 3.0, "sentinel-2a"),
        s2_record("S2B_20210706", 6, 80.0, "sentinel-2b"),
        s2_record("S2A_20210711", 11, 9.5, "sentinel-2a"),
        s2_record("S2B_20210716", 16, 0.5, "sentinel-2b"),
        s2_record("S2A_20210721", 21, 12.0, "sentinel-2a"),
    ])
}

fn resolver() -> StaticResolver {
    // Vegetation (4) everywhere, except one scene with cloud (9) in one pixel.
    let clear = create_constant_grid(SIZE, SIZE, 4.0);
    let one_cloud = create_grid_with_values(SIZE, SIZE, 4.0, 9.0, &[(0, 0)]);
    StaticResolver::new()
        .with_raster("s3://sentinel-cogs/S2A_20210701.tif", s2_raster(0.10, clear.clone()))
        .with_raster("s3://sentinel-cogs/S2B_20210706.tif", s2_raster(0.80, clear.clone()))
        .with_raster("s3://sentinel-cogs/S2A_20210711.tif", s2_raster(0.30, one_cloud))
        .with_raster("s3://sentinel-cogs/S2A_20210721.tif", s2_raster(0.50, clear))
}

async fn low_cloud_collection() -> RasterCollection {
    let query = CatalogQuery::new()
        .collection("sentinel-2-l2a")
        .time_range(TimeRange::new(date(2021, 7, 1), date(2021, 7, 31)))
        .filter("'cloudcover' 'lessthan' '10'".parse::<PropertyFilter>().unwrap());
    RasterCollection::from_catalog(&catalog(), &query, &AttributeProjection::stac())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_query_projects_and_filters() {
    init_tracing();

    let collection = low_cloud_collection().await;
    assert_eq!(
        collection.ids(),
        vec!["S2A_20210701", "S2A_20210711", "S2B_20210716"]
    );
    assert!(collection.iter().all(|r| !r.is_resolved()));
    assert_eq!(collection.records()[1].cloud_cover(), Some(9.5));

    let platforms = collection.value_counts("platform").unwrap();
    assert_eq!(platforms[&AttributeValue::from("sentinel-2a")], 2);
    assert_eq!(platforms[&AttributeValue::from("sentinel-2b")], 1);
}

#[tokio::test]
async fn test_resolve_mask_and_composite() {
    init_tracing();

    let pending = low_cloud_collection().await;

    // Pixel work before resolution is a precondition failure.
    assert!(matches!(
        pending.median(true, ExtentPolicy::Intersection),
        Err(RasterProcessorError::Unresolved(_))
    ));

    let resolved = resolve_collection(&pending, &resolver()).await;
    // S2B_20210716 has no payload registered and is dropped with a warning.
    assert_eq!(resolved.ids(), vec!["S2A_20210701", "S2A_20210711"]);
    assert_eq!(resolved.warnings().len(), 1);
    assert_eq!(resolved.warnings()[0].record_id, "S2B_20210716");

    let masker = ClassMasker::new(ClassMaskConfig::sentinel2_scl_cloud()).unwrap();
    let masked = resolved.map(&masker);
    // Warnings carry through derived collections.
    assert_eq!(masked.warnings().len(), 1);

    let median = masked.median(true, ExtentPolicy::Intersection).unwrap();
    let red = median.band(bands::S2_RED).unwrap();
    // Cloudy pixel only sees the 0.10 scene; elsewhere the even-count
    // median averages 0.10 and 0.30.
    assert_eq!(red.valid_value(0), Some(0.10));
    let blended = red.valid_value(5).unwrap();
    assert!((blended - 0.20).abs() < 1e-6);
}

struct FlakyResolver;

#[async_trait]
impl RasterResolver for FlakyResolver {
    async fn resolve(&self, record: &SceneRecord) -> raster_processor::Result<Raster> {
        match record.id() {
            "S2A_20210711" => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                unreachable!("resolution must be cancelled by its deadline")
            }
            "S2B_20210716" => Err(RasterProcessorError::invalid_raster("truncated COG")),
            _ => Ok(s2_raster(0.1, create_constant_grid(SIZE, SIZE, 4.0))),
        }
    }
}

#[tokio::test]
async fn test_hung_and_corrupt_payloads_are_skipped() {
    let pending = low_cloud_collection().await;
    let resolved =
        resolve_collection_with(&pending, &FlakyResolver, 4, Duration::from_millis(100)).await;

    assert_eq!(resolved.ids(), vec!["S2A_20210701"]);
    let kinds: Vec<&RasterProcessorError> = resolved.warnings().iter().map(|w| &w.error).collect();
    assert!(matches!(kinds[0], RasterProcessorError::Timeout { .. }));
    assert!(matches!(kinds[1], RasterProcessorError::Resolution { .. }));
}
