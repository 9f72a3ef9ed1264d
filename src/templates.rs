//! Route shape classification for individual rides.
//!
//! - `loop`: first and last key points are within 0.5 km
//! - `out_back`: the second half retraces the first (more than 60% of mirrored key
//!   point pairs within 1 km)
//! - `point_to_point`: anything else

use serde::{Deserialize, Serialize};

use crate::geo_utils::planar_distance_km;
use crate::GpsPoint;

/// Topology of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteShape {
    Loop,
    OutBack,
    PointToPoint,
}

impl RouteShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteShape::Loop => "loop",
            RouteShape::OutBack => "out_back",
            RouteShape::PointToPoint => "point_to_point",
        }
    }
}

/// Classification thresholds, all in planar kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeThresholds {
    pub loop_closure_km: f64,
    pub mirror_pair_km: f64,
    pub mirror_ratio: f64,
}

impl Default for ShapeThresholds {
    fn default() -> Self {
        Self {
            loop_closure_km: 0.5,
            mirror_pair_km: 1.0,
            mirror_ratio: 0.6,
        }
    }
}

/// One ride's shape classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTemplate {
    pub ride_id: String,
    pub shape: RouteShape,
    /// Summary distance if recorded
    pub distance_km: Option<f64>,
    pub key_point_count: usize,
}

/// Classify a sequence of key points. Returns `None` for fewer than 3 points.
///
/// # Example
/// ```
/// use ride_planner::{classify_route_shape, GpsPoint, RouteShape};
/// use ride_planner::templates::ShapeThresholds;
///
/// let out: Vec<GpsPoint> = (0..5).map(|i| GpsPoint::new(46.0 + i as f64 * 0.02, 7.0)).collect();
/// let mut there_and_back = out.clone();
/// there_and_back.extend(out.iter().rev().skip(1));
///
/// let shape = classify_route_shape(&there_and_back, &ShapeThresholds::default());
/// assert_eq!(shape, Some(RouteShape::Loop)); // ends where it started
/// ```
pub fn classify_route_shape(key_points: &[GpsPoint], thresholds: &ShapeThresholds) -> Option<RouteShape> {
    if key_points.len() < 3 {
        return None;
    }

    let first = key_points[0];
    let last = key_points[key_points.len() - 1];
    if planar_distance_km(&first, &last) < thresholds.loop_closure_km {
        return Some(RouteShape::Loop);
    }

    let mid = key_points.len() / 2;
    let first_half = &key_points[..mid];
    let second_half: Vec<GpsPoint> = key_points[mid..].iter().rev().copied().collect();

    let pairs = first_half.len().min(second_half.len());
    if pairs > 0 {
        let close = first_half
            .iter()
            .zip(second_half.iter())
            .filter(|(a, b)| planar_distance_km(a, b) < thresholds.mirror_pair_km)
            .count();
        if close as f64 / pairs as f64 > thresholds.mirror_ratio {
            return Some(RouteShape::OutBack);
        }
    }

    Some(RouteShape::PointToPoint)
}

/// Classify every ride that has enough key points.
///
/// `rides` pairs each ride id and summary distance with its key point positions.
pub fn build_route_templates(
    rides: &[(String, Option<f64>, Vec<GpsPoint>)],
    thresholds: &ShapeThresholds,
) -> Vec<RouteTemplate> {
    rides
        .iter()
        .filter_map(|(ride_id, distance_km, keys)| {
            classify_route_shape(keys, thresholds).map(|shape| RouteTemplate {
                ride_id: ride_id.clone(),
                shape,
                distance_km: *distance_km,
                key_point_count: keys.len(),
            })
        })
        .collect()
}
