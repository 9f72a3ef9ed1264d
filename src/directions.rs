//! Preferred riding directions from a bearing-sector histogram.
//!
//! Every consecutive pair of samples within a ride contributes one bearing. Bearings
//! are binned into eight 45° sectors centred on the compass points:
//! `sector = floor(((bearing + 22.5) mod 360) / 45)`.

use serde::{Deserialize, Serialize};

use crate::geo_utils::bearing_degrees;
use crate::GpsPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompassDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CompassDirection {
    pub const ALL: [CompassDirection; 8] = [
        CompassDirection::N,
        CompassDirection::NE,
        CompassDirection::E,
        CompassDirection::SE,
        CompassDirection::S,
        CompassDirection::SW,
        CompassDirection::W,
        CompassDirection::NW,
    ];

    /// Centre bearing of the sector in degrees.
    pub fn bearing(&self) -> f64 {
        self.index() as f64 * 45.0
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Sector for a bearing in degrees.
///
/// ```
/// use ride_planner::directions::sector_for_bearing;
/// use ride_planner::CompassDirection;
///
/// assert_eq!(sector_for_bearing(350.0), CompassDirection::N);
/// assert_eq!(sector_for_bearing(22.5), CompassDirection::NE);
/// assert_eq!(sector_for_bearing(200.0), CompassDirection::S);
/// ```
pub fn sector_for_bearing(bearing: f64) -> CompassDirection {
    let idx = (((bearing + 22.5).rem_euclid(360.0)) / 45.0).floor() as usize;
    CompassDirection::ALL[idx.min(7)]
}

/// A compass sector the rider favours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionPreference {
    pub direction: CompassDirection,
    /// Sector centre in degrees
    pub bearing_deg: f64,
    /// Number of legs heading into this sector
    pub frequency: u32,
    /// `frequency / total legs`
    pub preference: f64,
}

/// Build the rider's preferred directions from per-ride ordered samples.
///
/// Sectors with `preference <= min_preference` are dropped; the rest are sorted by
/// frequency (descending, compass order on ties) and capped at `max_directions`.
pub fn analyze_direction_preferences(
    rides: &[Vec<GpsPoint>],
    min_preference: f64,
    max_directions: usize,
) -> Vec<DirectionPreference> {
    let mut histogram = [0u32; 8];
    let mut total = 0u32;

    for samples in rides {
        for pair in samples.windows(2) {
            let bearing = bearing_degrees(&pair[0], &pair[1]);
            histogram[sector_for_bearing(bearing).index()] += 1;
            total += 1;
        }
    }

    if total == 0 {
        return vec![];
    }

    let mut prefs: Vec<DirectionPreference> = CompassDirection::ALL
        .iter()
        .zip(histogram.iter())
        .filter(|(_, count)| **count > 0)
        .map(|(dir, count)| DirectionPreference {
            direction: *dir,
            bearing_deg: dir.bearing(),
            frequency: *count,
            preference: *count as f64 / total as f64,
        })
        .filter(|p| p.preference > min_preference)
        .collect();

    prefs.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    prefs.truncate(max_directions);
    prefs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::destination_point;

    fn path(bearings: &[f64]) -> Vec<GpsPoint> {
        let mut points = vec![GpsPoint::new(46.0, 7.0)];
        for b in bearings {
            let last = *points.last().unwrap();
            points.push(destination_point(&last, *b, 1.0));
        }
        points
    }

    #[test]
    fn test_sector_boundaries() {
        assert_eq!(sector_for_bearing(0.0), CompassDirection::N);
        assert_eq!(sector_for_bearing(22.49), CompassDirection::N);
        assert_eq!(sector_for_bearing(337.5), CompassDirection::N);
        assert_eq!(sector_for_bearing(337.49), CompassDirection::NW);
        assert_eq!(sector_for_bearing(90.0), CompassDirection::E);
        assert_eq!(sector_for_bearing(359.99), CompassDirection::N);
    }

    #[test]
    fn test_empty_input() {
        assert!(analyze_direction_preferences(&[], 0.1, 3).is_empty());
        assert!(analyze_direction_preferences(&[vec![GpsPoint::new(46.0, 7.0)]], 0.1, 3).is_empty());
    }

    #[test]
    fn test_dominant_direction() {
        let ride = path(&[0.0, 0.0, 0.0, 90.0, 90.0, 180.0]);
        let prefs = analyze_direction_preferences(&[ride], 0.1, 3);
        assert_eq!(prefs.len(), 3);
        assert_eq!(prefs[0].direction, CompassDirection::N);
        assert_eq!(prefs[0].frequency, 3);
        assert!((prefs[0].preference - 0.5).abs() < 1e-12);
        assert_eq!(prefs[1].direction, CompassDirection::E);
        assert_eq!(prefs[1].bearing_deg, 90.0);
        assert_eq!(prefs[2].direction, CompassDirection::S);
    }

    #[test]
    fn test_low_preference_filtered_and_capped() {
        // 11 legs: N x4, E x3, S x2, W x1, NE x1
        let ride = path(&[0.0, 0.0, 0.0, 0.0, 90.0, 90.0, 90.0, 180.0, 180.0, 270.0, 45.0]);
        let prefs = analyze_direction_preferences(&[ride], 0.1, 3);
        assert!(prefs.len() <= 3);
        assert!(prefs.iter().all(|p| p.preference > 0.1));
        assert_eq!(prefs[0].direction, CompassDirection::N);
        // W and NE are 1/11 < 0.1
        assert!(prefs.iter().all(|p| p.direction != CompassDirection::W));
    }

    #[test]
    fn test_bearings_not_counted_across_rides() {
        let a = vec![GpsPoint::new(46.0, 7.0), GpsPoint::new(46.1, 7.0)];
        let b = vec![GpsPoint::new(45.0, 7.0), GpsPoint::new(45.1, 7.0)];
        let prefs = analyze_direction_preferences(&[a, b], 0.1, 3);
        // Two northbound legs, nothing from the jump between rides
        assert_eq!(prefs.len(), 1);
        assert_eq!(prefs[0].frequency, 2);
    }
}
