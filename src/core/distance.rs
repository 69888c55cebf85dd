use crate::models::BoundingBox;

/// Earth's radius in miles
pub const EARTH_RADIUS_MILES: f64 = 3956.0;

/// Miles per degree of latitude used by the bounding box approximation
pub const MILES_PER_DEGREE: f64 = 69.172;

/// Decimal places of stored coordinates
const BOX_PRECISION: i32 = 4;

/// Calculate the great-circle distance between two points in miles
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in miles
#[inline]
pub fn great_circle_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // rounding can push `a` a hair past 1 for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Round to a fixed number of decimal places
#[inline]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Calculate a bounding box around a center point
///
/// 1° latitude ≈ 69.172 miles, 1° longitude ≈ 69.172 miles * cos(latitude).
/// The box is a superset of the circle: edges are snapped outward to the
/// stored coordinate precision, and the longitude span covers the whole
/// globe when the cosine vanishes near the poles.
///
/// # Arguments
/// * `lat` - Center latitude in degrees
/// * `lon` - Center longitude in degrees
/// * `radius_miles` - Radius in miles
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_miles: f64) -> BoundingBox {
    let lat_delta = (radius_miles / MILES_PER_DEGREE).abs();

    let lon_scale = lat.to_radians().cos().abs() * MILES_PER_DEGREE;
    let lon_delta = (radius_miles / lon_scale).abs();

    let (min_lon, max_lon) = if lon_delta.is_finite() && lon_delta < 180.0 {
        (floor_to(lon - lon_delta), ceil_to(lon + lon_delta))
    } else {
        (-180.0, 180.0)
    };

    BoundingBox {
        min_lat: floor_to(lat - lat_delta),
        max_lat: ceil_to(lat + lat_delta),
        min_lon,
        max_lon,
    }
}

fn floor_to(value: f64) -> f64 {
    let factor = 10f64.powi(BOX_PRECISION);
    (value * factor).floor() / factor
}

fn ceil_to(value: f64) -> f64 {
    let factor = 10f64.powi(BOX_PRECISION);
    (value * factor).ceil() / factor
}

/// Check if a point is within a bounding box, edges inclusive
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    lat >= bbox.min_lat
        && lat <= bbox.max_lat
        && lon >= bbox.min_lon
        && lon <= bbox.max_lon
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_great_circle_boston_nyc() {
        let distance = great_circle_miles(42.3601, -71.0589, 40.7128, -74.0060);
        assert!((distance - 190.0).abs() < 5.0, "Distance should be ~190mi, got {}", distance);
    }

    #[test]
    fn test_great_circle_antipodal_is_finite() {
        let distance = great_circle_miles(0.0, 0.0, 0.0, 180.0);
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_MILES;
        assert!((distance - half_circumference).abs() < 1e-6);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(190.23456, 2), 190.23);
        assert_eq!(round_to(190.235001, 2), 190.24);
        assert_eq!(round_to(1.5, 0), 2.0);
    }

    #[test]
    fn test_bounding_box() {
        let bbox = calculate_bounding_box(40.7128, -74.0060, 10.0);

        assert!(bbox.min_lat < 40.7128);
        assert!(bbox.max_lat > 40.7128);
        assert!(bbox.min_lon < -74.0060);
        assert!(bbox.max_lon > -74.0060);

        // 20mi / 69.172mi per degree = ~0.289 degrees
        let lat_span = bbox.max_lat - bbox.min_lat;
        assert!((lat_span - 0.289).abs() < 0.002, "Lat span should be ~0.289 degrees, got {}", lat_span);

        // longitude degrees shrink with cos(latitude), so the span widens
        let lon_span = bbox.max_lon - bbox.min_lon;
        assert!(lon_span > lat_span);
    }

    #[test]
    fn test_bounding_box_edges_snapped_outward() {
        let bbox = calculate_bounding_box(43.61, -70.33, 7.0);
        for edge in [bbox.min_lat, bbox.max_lat, bbox.min_lon, bbox.max_lon] {
            assert_eq!(edge, round_to(edge, 4));
        }
        assert!(bbox.min_lat <= 43.61 - 7.0 / MILES_PER_DEGREE);
        assert!(bbox.max_lat >= 43.61 + 7.0 / MILES_PER_DEGREE);
    }

    #[test]
    fn test_bounding_box_at_pole_spans_all_longitudes() {
        let bbox = calculate_bounding_box(90.0, 10.0, 50.0);
        assert_eq!(bbox.min_lon, -180.0);
        assert_eq!(bbox.max_lon, 180.0);
    }

    #[test]
    fn test_bounding_box_zero_radius() {
        let bbox = calculate_bounding_box(40.7128, -74.0060, 0.0);
        assert!(is_within_bounding_box(40.7128, -74.0060, &bbox));
    }

    #[test]
    fn test_point_within_bbox() {
        let bbox = calculate_bounding_box(40.7128, -74.0060, 10.0);

        // Center point should be within
        assert!(is_within_bounding_box(40.7128, -74.0060, &bbox));

        // Close point should be within
        assert!(is_within_bounding_box(40.71, -74.0, &bbox));

        // Far point should not be within
        assert!(!is_within_bounding_box(50.0, -80.0, &bbox));
    }
}
