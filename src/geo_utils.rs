//! # Geographic Utilities
//!
//! Shared geometry and statistics helpers for ride mining and route synthesis.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points (meters) |
//! | [`haversine_km`] | Great-circle distance in kilometers |
//! | [`planar_distance_degrees`] | Euclidean distance in raw degree space |
//! | [`planar_distance_km`] | Degree-space distance scaled to kilometers |
//! | [`bearing_degrees`] | Initial compass bearing from one point to another |
//! | [`bearing_difference`] | Wrapped angular difference in `[0, 180]` |
//! | [`destination_point`] | Point reached by travelling a distance along a bearing |
//! | [`compute_center`] | Arithmetic centroid of a set of points |
//! | [`percentile`] | Floor-indexed percentile of a sorted slice |
//!
//! ## Planar Approximation
//!
//! Clustering, segment chopping, segment merging and shape classification measure
//! distance in raw degree space (`sqrt(dlat² + dlon²)`), scaled by
//! [`KM_PER_DEGREE`] where a kilometer value is needed. This ignores the
//! `cos(latitude)` shrink of longitude degrees, so east-west tolerances get wider
//! toward the poles. Thresholds are expressed against this metric and must not be
//! mixed with the great-circle helpers.

use geo::{Distance, Haversine, Point};

use crate::GpsPoint;

/// Kilometers per degree used by the planar approximation.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters.
///
/// # Example
///
/// ```rust
/// use ride_planner::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Great-circle distance in kilometers.
#[inline]
pub fn haversine_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    haversine_distance(p1, p2) / 1000.0
}

/// Total great-circle length of a polyline in meters.
///
/// Empty or single-point tracks return 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Euclidean distance between two points in degree space.
#[inline]
pub fn planar_distance_degrees(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let dlat = p1.latitude - p2.latitude;
    let dlng = p1.longitude - p2.longitude;
    (dlat * dlat + dlng * dlng).sqrt()
}

/// Planar degree-space distance scaled to kilometers.
///
/// ```rust
/// use ride_planner::{GpsPoint, geo_utils};
///
/// let a = GpsPoint::new(46.00, 7.00);
/// let b = GpsPoint::new(46.01, 7.00);
/// assert!((geo_utils::planar_distance_km(&a, &b) - 1.1132).abs() < 1e-9);
/// ```
#[inline]
pub fn planar_distance_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    planar_distance_degrees(p1, p2) * KM_PER_DEGREE
}

// =============================================================================
// Bearing Functions
// =============================================================================

/// Initial great-circle bearing from `from` to `to`, in degrees `[0, 360)`.
///
/// 0 is north, 90 east. Identical points return 0.
pub fn bearing_degrees(from: &GpsPoint, to: &GpsPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlng = (to.longitude - from.longitude).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Wrap any angle in degrees into `[0, 360)`.
#[inline]
pub fn normalize_bearing(bearing: f64) -> f64 {
    let wrapped = bearing.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Smallest angle between two bearings, in degrees `[0, 180]`.
///
/// ```rust
/// use ride_planner::geo_utils::bearing_difference;
///
/// assert_eq!(bearing_difference(350.0, 10.0), 20.0);
/// assert_eq!(bearing_difference(90.0, 270.0), 180.0);
/// ```
#[inline]
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Point reached from `origin` after `distance_km` along `bearing_deg`.
///
/// Uses the spherical direct formula. The result always has a valid latitude and a
/// longitude wrapped into `[-180, 180]`.
pub fn destination_point(origin: &GpsPoint, bearing_deg: f64, distance_km: f64) -> GpsPoint {
    let angular = distance_km / EARTH_RADIUS_KM;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lng1 = origin.longitude.to_radians();

    let sin_lat2 = lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();
    let lng2 = lng1
        + (bearing.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * sin_lat2);

    let lng_deg = (lng2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;
    GpsPoint::new(lat2.to_degrees().clamp(-90.0, 90.0), lng_deg)
}

// =============================================================================
// Center/Centroid Functions
// =============================================================================

/// Compute the arithmetic centroid of a set of points.
///
/// Returns (0, 0) for empty input. Suitable for areas of a few tens of kilometers.
pub fn compute_center(points: &[GpsPoint]) -> GpsPoint {
    if points.is_empty() {
        return GpsPoint::new(0.0, 0.0);
    }

    let sum_lat: f64 = points.iter().map(|p| p.latitude).sum();
    let sum_lng: f64 = points.iter().map(|p| p.longitude).sum();
    let n = points.len() as f64;

    GpsPoint::new(sum_lat / n, sum_lng / n)
}

// =============================================================================
// Statistics
// =============================================================================

/// Percentile of an ascending-sorted slice using floor indexing.
///
/// The index is `floor(len * q)`, clamped to the last element. Returns `None` for
/// empty input.
///
/// ```rust
/// use ride_planner::geo_utils::percentile;
///
/// let sorted = [10.0, 20.0, 30.0, 40.0];
/// assert_eq!(percentile(&sorted, 0.25), Some(20.0));
/// assert_eq!(percentile(&sorted, 0.9), Some(40.0));
/// ```
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64 * q).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// Arithmetic mean, 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

// =============================================================================
// Unit Tests
// =============================================================================
