// Unit tests for Zippy Geo

use zippy_geo::core::{
    distance::{great_circle_miles, calculate_bounding_box, is_within_bounding_box, round_to, MILES_PER_DEGREE},
    find_zip_in_text,
    ProximitySearch,
};
use zippy_geo::models::{normalize_zip, Point, Radius, Unit, MILES_TO_KM};
use zippy_geo::services::{rank_order_case, MemoryPointStore};

#[test]
fn test_great_circle_zero() {
    let distance = great_circle_miles(40.7128, -74.0060, 40.7128, -74.0060);
    assert!(distance < 0.01);
}

#[test]
fn test_great_circle_manhattan_to_brooklyn() {
    // Manhattan to Brooklyn is approximately 3-7 miles
    let distance = great_circle_miles(40.7580, -73.9855, 40.6782, -73.9442);
    assert!(distance > 3.0 && distance < 7.0, "got {}", distance);
}

#[test]
fn test_great_circle_boston_nyc() {
    let distance = great_circle_miles(42.3601, -71.0589, 40.7128, -74.0060);
    assert!((distance - 190.0).abs() < 5.0, "Expected ~190mi, got {}", distance);
}

#[test]
fn test_bounding_box_creation() {
    let bbox = calculate_bounding_box(40.7128, -74.0060, 10.0);

    assert!(bbox.min_lat < 40.7128);
    assert!(bbox.max_lat > 40.7128);
    assert!(bbox.min_lon < -74.0060);
    assert!(bbox.max_lon > -74.0060);

    let lat_span = bbox.max_lat - bbox.min_lat;
    assert!((lat_span - 20.0 / MILES_PER_DEGREE).abs() < 0.001);
}

#[test]
fn test_bounding_box_contains_circle() {
    // 69.172 mi/deg is slightly more than the 3956mi sphere's 69.045, so the box is
    // about 0.2% tight at its edges; walk a circle at 99% of the radius
    for &(lat, lon) in &[(43.5, -70.4), (64.8, -147.7), (-33.9, 151.2), (0.0, 0.0)] {
        let radius = 25.0;
        let bbox = calculate_bounding_box(lat, lon, radius);
        for step in 0..72 {
            let bearing = (step as f64 * 5.0_f64).to_radians();
            let (p_lat, p_lon) = destination(lat, lon, bearing, radius * 0.99);
            assert!(
                is_within_bounding_box(p_lat, p_lon, &bbox),
                "({}, {}) at bearing {} escaped box {:?}",
                p_lat,
                p_lon,
                step * 5,
                bbox
            );
        }
    }
}

/// Point at `miles` along `bearing` from (lat, lon) on the 3956mi sphere
fn destination(lat: f64, lon: f64, bearing: f64, miles: f64) -> (f64, f64) {
    let delta = miles / 3956.0;
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());
    (lat2.to_degrees(), lon2.to_degrees())
}

#[test]
fn test_round_to_precision() {
    assert_eq!(round_to(3.14159, 2), 3.14);
    assert_eq!(round_to(3.14159, 4), 3.1416);
    assert_eq!(round_to(3.14159, 0), 3.0);
}

#[test]
fn test_unit_factor() {
    assert_eq!(MILES_TO_KM, 1.609344);
    assert!((Unit::Kilometers.from_miles(100.0) - 160.9344).abs() < 1e-9);
}

#[test]
fn test_normalize_zip_padding() {
    assert_eq!(normalize_zip("501"), "00501");
    assert_eq!(normalize_zip("12345"), "12345");
}

#[test]
fn test_radius_unbounded_sentinel() {
    assert_eq!("all".parse::<Radius>().unwrap(), Radius::Unbounded);
    assert!("-0.5".parse::<Radius>().is_err());
}

#[test]
fn test_find_zip_in_text() {
    assert_eq!(find_zip_in_text("Kennebunk ME 04043").as_deref(), Some("04043"));
    assert_eq!(find_zip_in_text("Kennebunk"), None);
}

#[test]
fn test_rank_order_case() {
    let ids = vec!["04072".to_string(), "04005".to_string(), "04101".to_string()];
    let clause = rank_order_case(&ids, "zip_code").unwrap();
    assert!(clause.starts_with("(CASE zip_code WHEN '04072' THEN 1"));
    assert!(clause.ends_with("WHEN '04101' THEN 3 ELSE 100 END) ASC"));
}

#[test]
fn test_distance_between_blocking() {
    let store = MemoryPointStore::from_points(vec![
        Point::new("02108", 42.3601, -71.0589),
        Point::new("10007", 40.7128, -74.0060),
    ]);
    let search = ProximitySearch::default();

    let miles = tokio_test::block_on(search.distance_between(&store, "02108", "10007", Unit::Miles)).unwrap();
    let km = tokio_test::block_on(search.distance_between(&store, "02108", "10007", Unit::Kilometers)).unwrap();

    assert!((miles - 190.0).abs() < 5.0);
    assert!((km - miles * MILES_TO_KM).abs() < 0.02);
}
