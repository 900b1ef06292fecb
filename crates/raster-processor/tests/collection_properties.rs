//! Order and identity properties of collection operations.

use raster_processor::{
    AttributeValue, Identity, ProcessorConfig, Raster, RasterCollection, RegionLabeler,
    SceneRecord,
};
use test_utils::{create_mask_from_ascii, create_test_grid, scene_dates, GridSpec};

fn collection(n: usize) -> RasterCollection {
    let spec = GridSpec::utm(3, 3);
    // Dates deliberately out of order, cloud cover cycling with repeats.
    let mut dates = scene_dates(2019, n, 11);
    dates.reverse();
    let records = dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| {
            let raster = Raster::single_band(
                "b",
                3,
                3,
                create_test_grid(3, 3),
                spec.crs(),
                spec.extent(),
            )
            .unwrap();
            let record = SceneRecord::from_raster(format!("scene-{:02}", i), date, "sentinel-2a", raster);
            if i % 4 == 3 {
                record
            } else {
                record.with_cloud_cover((i % 3) as f64 * 10.0)
            }
        })
        .collect();
    RasterCollection::from_records(records).unwrap()
}

#[test]
fn test_sorted_values_are_monotonic() {
    let col = collection(24);
    for field in ["datetime", "cloud_cover", "id"] {
        let ascending = col.sort_by(field, true).unwrap().get_field_values(field).unwrap();
        assert!(ascending.windows(2).all(|w| w[0] <= w[1]), "{} ascending", field);

        let descending = col.sort_by(field, false).unwrap().get_field_values(field).unwrap();
        assert!(descending.windows(2).all(|w| w[0] >= w[1]), "{} descending", field);
        assert_eq!(descending.len(), col.len());
    }
}

#[test]
fn test_absent_values_sort_first() {
    let values = collection(8)
        .sort_by("cloud_cover", true)
        .unwrap()
        .get_field_values("cloud_cover")
        .unwrap();
    assert!(values[0].is_absent());
    assert!(values[1].is_absent());
    assert_eq!(values[2], AttributeValue::Number(0.0));
}

#[test]
fn test_identity_map_keeps_pixels_sequential_and_parallel() {
    for parallel in [true, false] {
        let col = collection(6).with_config(ProcessorConfig {
            parallel,
            ..ProcessorConfig::default()
        });
        let mapped = col.map(&Identity);
        assert_eq!(mapped.ids(), col.ids());
        for (a, b) in col.iter().zip(mapped.iter()) {
            assert_eq!(a.raster().unwrap(), b.raster().unwrap());
        }
    }
}

#[test]
fn test_labeling_is_tile_invariant() {
    let (width, height, data) = create_mask_from_ascii(&[
        "#..#....##",
        ".#..#..#..",
        "..##.?#...",
        "#....#....",
        ".#..#.#..#",
        "..#....#.#",
        "...#.....#",
    ]);
    let spec = GridSpec::utm(width, height);
    let mask = Raster::single_band("water", width, height, data, spec.crs(), spec.extent()).unwrap();

    let reference = RegionLabeler::new(ProcessorConfig {
        tile_rows: height,
        parallel: false,
        ..ProcessorConfig::default()
    })
    .label(&mask)
    .unwrap();

    for tile_rows in 1..height {
        let tiled = RegionLabeler::new(ProcessorConfig {
            tile_rows,
            ..ProcessorConfig::default()
        })
        .label(&mask)
        .unwrap();
        assert_eq!(tiled, reference, "tile_rows = {}", tile_rows);
    }
}
