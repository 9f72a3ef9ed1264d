//! Reduces a raw ride track to its decision points.
//!
//! A point is kept when the heading into it and the heading out of it differ by
//! more than the turn threshold. The first and last samples are always kept so
//! the reduced series spans the whole ride.

use serde::{Deserialize, Serialize};

use crate::geo_utils::{bearing_degrees, bearing_difference};
use crate::TrackPoint;

/// Default turn threshold in degrees.
pub const DEFAULT_TURN_THRESHOLD_DEG: f64 = 30.0;

/// A track point retained because it marks a significant direction change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub point: TrackPoint,
    /// Index of this point in the source track
    pub index: usize,
    /// Heading change at this point in degrees (0 for the endpoints)
    pub bearing_change: f64,
    /// `min(bearing_change / 90, 1)`; endpoints are anchors and get 1.0
    pub confidence: f64,
}

impl KeyPoint {
    fn anchor(point: TrackPoint, index: usize) -> Self {
        Self {
            point,
            index,
            bearing_change: 0.0,
            confidence: 1.0,
        }
    }
}

/// Extract key points from an ordered track.
///
/// Tracks with fewer than 3 points are returned unchanged (each point wrapped as
/// an anchor), since there is no interior point to test.
///
/// # Example
/// ```
/// use ride_planner::{extract_key_points, TrackPoint};
///
/// // North, then a sharp turn east
/// let track = vec![
///     TrackPoint::new(46.00, 7.00),
///     TrackPoint::new(46.01, 7.00),
///     TrackPoint::new(46.01, 7.01),
/// ];
/// let keys = extract_key_points(&track, 30.0);
/// assert_eq!(keys.len(), 3);
/// ```
pub fn extract_key_points(points: &[TrackPoint], turn_threshold_deg: f64) -> Vec<KeyPoint> {
    if points.len() < 3 {
        return points
            .iter()
            .enumerate()
            .map(|(i, p)| KeyPoint::anchor(*p, i))
            .collect();
    }

    let mut keys = Vec::with_capacity(points.len() / 4 + 2);
    keys.push(KeyPoint::anchor(points[0], 0));

    for i in 1..points.len() - 1 {
        let prev = points[i - 1].position();
        let curr = points[i].position();
        let next = points[i + 1].position();

        let incoming = bearing_degrees(&prev, &curr);
        let outgoing = bearing_degrees(&curr, &next);
        let change = bearing_difference(incoming, outgoing);

        if change > turn_threshold_deg {
            keys.push(KeyPoint {
                point: points[i],
                index: i,
                bearing_change: change,
                confidence: (change / 90.0).min(1.0),
            });
        }
    }

    let last = points.len() - 1;
    keys.push(KeyPoint::anchor(points[last], last));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_track(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint::new(46.0 + i as f64 * 0.001, 7.0))
            .collect()
    }

    #[test]
    fn test_short_track_unchanged() {
        let track = straight_track(2);
        let keys = extract_key_points(&track, DEFAULT_TURN_THRESHOLD_DEG);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].point, track[0]);
        assert_eq!(keys[1].point, track[1]);
    }

    #[test]
    fn test_straight_track_keeps_endpoints_only() {
        let track = straight_track(20);
        let keys = extract_key_points(&track, DEFAULT_TURN_THRESHOLD_DEG);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].index, 0);
        assert_eq!(keys[1].index, 19);
    }

    #[test]
    fn test_right_angle_turn_detected() {
        let mut track = straight_track(5);
        // Head east from the last point
        let corner = track[4];
        for i in 1..5 {
            track.push(TrackPoint::new(corner.latitude, corner.longitude + i as f64 * 0.0015));
        }
        let keys = extract_key_points(&track, DEFAULT_TURN_THRESHOLD_DEG);
        assert_eq!(keys.len(), 3);
        let turn = keys[1];
        assert_eq!(turn.index, 4);
        assert!(turn.bearing_change > 85.0 && turn.bearing_change < 95.0);
        assert!(turn.confidence > 0.94);
    }

    #[test]
    fn test_shallow_bend_ignored() {
        let track = vec![
            TrackPoint::new(46.000, 7.000),
            TrackPoint::new(46.010, 7.000),
            // ~20 degree bend
            TrackPoint::new(46.020, 7.005),
        ];
        let keys = extract_key_points(&track, DEFAULT_TURN_THRESHOLD_DEG);
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_confidence_scales_with_change() {
        let track = vec![
            TrackPoint::new(46.000, 7.000),
            TrackPoint::new(46.010, 7.000),
            // ~45 degree bend (NE at this latitude is roughly dlat == dlng * cos(lat))
            TrackPoint::new(46.017, 7.010),
        ];
        let keys = extract_key_points(&track, DEFAULT_TURN_THRESHOLD_DEG);
        assert_eq!(keys.len(), 3);
        let c = keys[1].confidence;
        assert!(c > 0.4 && c < 0.6, "confidence {}", c);
        assert!((c - keys[1].bearing_change / 90.0).abs() < 1e-12);
    }
}
