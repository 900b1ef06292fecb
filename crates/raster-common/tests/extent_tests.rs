//! Tests for Extent parsing, overlap and reconciliation.

use raster_common::Extent;

// ============================================================================
// from_bbox_string tests
// ============================================================================

#[test]
fn test_parse_bbox_integer() {
    let extent = Extent::from_bbox_string("0,0,100,100").unwrap();
    assert_eq!(extent, Extent::new(0.0, 0.0, 100.0, 100.0));
}

#[test]
fn test_parse_bbox_utm_meters() {
    let extent = Extent::from_bbox_string("399960.0,4490220.0,509760.0,4600020.0").unwrap();
    assert!((extent.width() - 109800.0).abs() < 1e-6);
    assert!((extent.height() - 109800.0).abs() < 1e-6);
}

#[test]
fn test_parse_bbox_whitespace() {
    let extent = Extent::from_bbox_string(" -10.5, 20.0 ,-9.5, 21.0").unwrap();
    assert_eq!(extent.min_x, -10.5);
    assert_eq!(extent.max_y, 21.0);
}

#[test]
fn test_parse_bbox_invalid_format() {
    assert!(Extent::from_bbox_string("0,0,10").is_err());
    assert!(Extent::from_bbox_string("0,0,10,10,5").is_err());
    assert!(Extent::from_bbox_string("").is_err());
}

#[test]
fn test_parse_bbox_invalid_number() {
    assert!(Extent::from_bbox_string("0,zero,10,10").is_err());
}

#[test]
fn test_parse_bbox_inverted() {
    assert!(Extent::from_bbox_string("10,10,0,0").is_err());
}

// ============================================================================
// Overlap tests
// ============================================================================

#[test]
fn test_adjacent_extents_do_not_intersect() {
    let a = Extent::new(0.0, 0.0, 10.0, 10.0);
    let b = Extent::new(10.0, 0.0, 20.0, 10.0);
    assert!(!a.intersects(&b));
    assert!(a.intersection(&b).is_none());
}

#[test]
fn test_contained_extent_intersection_is_inner() {
    let outer = Extent::new(0.0, 0.0, 100.0, 100.0);
    let inner = Extent::new(25.0, 25.0, 75.0, 75.0);
    assert_eq!(outer.intersection(&inner), Some(inner));
    assert_eq!(outer.union(&inner), outer);
}

#[test]
fn test_intersection_with_self() {
    let extent = Extent::new(-5.0, -5.0, 5.0, 5.0);
    assert_eq!(extent.intersection(&extent), Some(extent));
}

#[test]
fn test_contains_point_on_edge() {
    let extent = Extent::new(0.0, 0.0, 10.0, 10.0);
    assert!(extent.contains_point(0.0, 5.0));
    assert!(extent.contains_point(10.0, 10.0));
    assert!(!extent.contains_point(10.0001, 5.0));
}

#[test]
fn test_approx_eq() {
    let a = Extent::new(0.0, 0.0, 30.0, 30.0);
    let b = Extent::new(1e-12, 0.0, 30.0, 30.0 - 1e-12);
    assert!(a.approx_eq(&b, 1e-9));
    assert!(!a.approx_eq(&Extent::new(0.0, 0.0, 30.0, 31.0), 1e-9));
}

#[test]
fn test_display_matches_bbox_string() {
    let extent = Extent::new(-1.5, 2.0, 3.25, 4.0);
    let parsed = Extent::from_bbox_string(&extent.to_string()).unwrap();
    assert_eq!(parsed, extent);
}
