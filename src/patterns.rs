//! # Riding Pattern Aggregation
//!
//! Runs every mining pass over a rider's history and assembles one
//! [`RidingPatternProfile`].
//!
//! Per-ride passes (key points, segments, shape templates) are independent and run
//! in parallel with the `parallel` feature; their results are collected in input
//! order, so the profile is identical either way. Cross-ride passes (clustering,
//! segment merging, statistics, directions) then run serially over those results.

use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::clustering::{find_frequent_areas, FrequentArea};
use crate::directions::{analyze_direction_preferences, DirectionPreference};
use crate::error::{PlannerError, Result};
use crate::segments::{extract_segments, RouteSegment, SegmentDatabase, SegmentDatabaseEntry};
use crate::statistics::{
    analyze_distance_distribution, analyze_elevation_tolerance, DistanceDistribution,
    ElevationTolerance,
};
use crate::templates::{classify_route_shape, RouteTemplate, ShapeThresholds};
use crate::track_reducer::extract_key_points;
use crate::{GpsPoint, RideRecord};

/// Configuration for pattern mining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Minimum heading change for a key point, in degrees. Default: 30
    pub turn_threshold_deg: f64,
    /// Rides with fewer points contribute no key points. Default: 3
    pub min_points_for_key_points: usize,
    /// Clustering tolerance in planar degrees. Default: 0.01 (~1.1 km)
    pub cluster_tolerance_deg: f64,
    /// Minimum cluster size for a frequent area. Default: 3
    pub min_cluster_size: usize,
    /// Maximum number of frequent areas kept. Default: 5
    pub max_frequent_areas: usize,
    /// Target segment length in kilometers. Default: 2.0
    pub segment_length_km: f64,
    /// Minimum points per segment. Default: 5
    pub min_segment_points: usize,
    /// Rides with fewer points are not segmented. Default: 10
    pub min_ride_points_for_segments: usize,
    /// Start-to-start and end-to-end merge distance in km. Default: 0.5
    pub segment_merge_distance_km: f64,
    /// Bearing tolerance for merging segments, degrees. Default: 30
    pub segment_bearing_tolerance_deg: f64,
    /// Directions at or below this share are dropped. Default: 0.1
    pub min_direction_preference: f64,
    /// Maximum number of preferred directions kept. Default: 3
    pub max_directions: usize,
    /// First-to-last distance under which a ride is a loop, km. Default: 0.5
    pub loop_threshold_km: f64,
    /// Mirrored key point pair distance for out-and-back, km. Default: 1.0
    pub out_back_pair_km: f64,
    /// Share of close mirrored pairs needed for out-and-back. Default: 0.6
    pub out_back_ratio: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            turn_threshold_deg: 30.0,
            min_points_for_key_points: 3,
            cluster_tolerance_deg: 0.01,
            min_cluster_size: 3,
            max_frequent_areas: 5,
            segment_length_km: 2.0,
            min_segment_points: 5,
            min_ride_points_for_segments: 10,
            segment_merge_distance_km: 0.5,
            segment_bearing_tolerance_deg: 30.0,
            min_direction_preference: 0.1,
            max_directions: 3,
            loop_threshold_km: 0.5,
            out_back_pair_km: 1.0,
            out_back_ratio: 0.6,
        }
    }
}

impl PatternConfig {
    /// Check thresholds that would make mining degenerate.
    ///
    /// Mining itself tolerates any configuration; this is for hosts loading
    /// configs from JSON.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("segment_length_km", self.segment_length_km),
            ("cluster_tolerance_deg", self.cluster_tolerance_deg),
            ("segment_merge_distance_km", self.segment_merge_distance_km),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PlannerError::Config {
                    message: format!("{} must be positive, got {}", name, value),
                });
            }
        }
        if !(0.0..=180.0).contains(&self.turn_threshold_deg)
            || !(0.0..=180.0).contains(&self.segment_bearing_tolerance_deg)
        {
            return Err(PlannerError::Config {
                message: "angle thresholds must lie in [0, 180] degrees".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.out_back_ratio)
            || !(0.0..=1.0).contains(&self.min_direction_preference)
        {
            return Err(PlannerError::Config {
                message: "ratios must lie in [0, 1]".to_string(),
            });
        }
        if self.min_ride_points_for_segments < 2 || self.min_segment_points < 2 {
            return Err(PlannerError::Config {
                message: format!(
                    "segmentation needs at least 2 points (ride {}, segment {})",
                    self.min_ride_points_for_segments, self.min_segment_points
                ),
            });
        }
        Ok(())
    }

    fn shape_thresholds(&self) -> ShapeThresholds {
        ShapeThresholds {
            loop_closure_km: self.loop_threshold_km,
            mirror_pair_km: self.out_back_pair_km,
            mirror_ratio: self.out_back_ratio,
        }
    }
}

/// Everything learned from a rider's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidingPatternProfile {
    /// Number of rides analysed (0 for the default profile)
    pub ride_count: usize,
    pub preferred_distances: DistanceDistribution,
    pub elevation_tolerance: ElevationTolerance,
    pub frequent_areas: Vec<FrequentArea>,
    pub direction_preferences: Vec<DirectionPreference>,
    /// Merged segments, best ranked first
    pub route_segments: Vec<SegmentDatabaseEntry>,
    pub route_templates: Vec<RouteTemplate>,
}

impl Default for RidingPatternProfile {
    fn default() -> Self {
        Self::default_profile()
    }
}

impl RidingPatternProfile {
    /// Profile for a rider with no history: default distance and elevation
    /// distributions and no areas, directions, segments or templates.
    pub fn default_profile() -> Self {
        Self {
            ride_count: 0,
            preferred_distances: DistanceDistribution::default(),
            elevation_tolerance: ElevationTolerance::default(),
            frequent_areas: Vec::new(),
            direction_preferences: Vec::new(),
            route_segments: Vec::new(),
            route_templates: Vec::new(),
        }
    }

    /// True when the profile was mined from at least one ride.
    pub fn has_history(&self) -> bool {
        self.ride_count > 0
    }

    /// Weighted sum of the sub-signals that came from real history.
    ///
    /// | Signal | Weight |
    /// |--------|--------|
    /// | distance distribution | 0.30 |
    /// | elevation tolerance | 0.20 |
    /// | frequent areas | 0.20 |
    /// | direction preferences | 0.15 |
    /// | segment database | 0.15 |
    pub fn overall_confidence(&self) -> f64 {
        let mut confidence = 0.0;
        if self.preferred_distances.sample_count > 0 {
            confidence += 0.3;
        }
        if self.elevation_tolerance.sample_count > 0 {
            confidence += 0.2;
        }
        if !self.frequent_areas.is_empty() {
            confidence += 0.2;
        }
        if !self.direction_preferences.is_empty() {
            confidence += 0.15;
        }
        if !self.route_segments.is_empty() {
            confidence += 0.15;
        }
        confidence
    }
}

/// Per-ride mining output.
struct RideMining {
    key_positions: Vec<GpsPoint>,
    segments: Vec<RouteSegment>,
    template: Option<RouteTemplate>,
}

fn mine_ride(ride: &RideRecord, config: &PatternConfig, thresholds: &ShapeThresholds) -> RideMining {
    let key_positions: Vec<GpsPoint> = if ride.track_points.len() < config.min_points_for_key_points {
        debug!(
            "[Patterns] Ride {} has {} points, no key points",
            ride.id,
            ride.track_points.len()
        );
        Vec::new()
    } else {
        extract_key_points(&ride.track_points, config.turn_threshold_deg)
            .iter()
            .map(|k| k.point.position())
            .filter(GpsPoint::is_valid)
            .collect()
    };

    let segments = extract_segments(
        ride,
        config.segment_length_km,
        config.min_segment_points,
        config.min_ride_points_for_segments,
    );

    let template = classify_route_shape(&key_positions, thresholds).map(|shape| RouteTemplate {
        ride_id: ride.id.clone(),
        shape,
        distance_km: ride.summary.distance_km,
        key_point_count: key_positions.len(),
    });

    RideMining {
        key_positions,
        segments,
        template,
    }
}

/// Analyse rides with the default [`PatternConfig`].
///
/// Pure and deterministic: the same rides in the same order always produce the
/// same profile. Returns [`RidingPatternProfile::default_profile`] for no rides.
pub fn analyze_riding_patterns(rides: &[RideRecord]) -> RidingPatternProfile {
    analyze_riding_patterns_with_config(rides, &PatternConfig::default())
}

/// Analyse rides with a custom configuration.
pub fn analyze_riding_patterns_with_config(
    rides: &[RideRecord],
    config: &PatternConfig,
) -> RidingPatternProfile {
    if rides.is_empty() {
        debug!("[Patterns] No rides, using default profile");
        return RidingPatternProfile::default_profile();
    }

    let start = Instant::now();
    let thresholds = config.shape_thresholds();

    #[cfg(feature = "parallel")]
    let mined: Vec<RideMining> = {
        use rayon::prelude::*;
        rides
            .par_iter()
            .map(|ride| mine_ride(ride, config, &thresholds))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let mined: Vec<RideMining> = rides
        .iter()
        .map(|ride| mine_ride(ride, config, &thresholds))
        .collect();

    let all_key_positions: Vec<GpsPoint> = mined
        .iter()
        .flat_map(|m| m.key_positions.iter().copied())
        .collect();

    let frequent_areas = find_frequent_areas(
        &all_key_positions,
        config.cluster_tolerance_deg,
        config.min_cluster_size,
        config.max_frequent_areas,
    );

    let per_ride_positions: Vec<Vec<GpsPoint>> =
        mined.iter().map(|m| m.key_positions.clone()).collect();
    let direction_preferences = analyze_direction_preferences(
        &per_ride_positions,
        config.min_direction_preference,
        config.max_directions,
    );

    let mut route_templates = Vec::new();
    let mut all_segments = Vec::new();
    for m in mined {
        all_segments.extend(m.segments);
        route_templates.extend(m.template);
    }
    let segment_count = all_segments.len();
    let database = SegmentDatabase::build(
        all_segments,
        config.segment_merge_distance_km,
        config.segment_bearing_tolerance_deg,
    );

    let profile = RidingPatternProfile {
        ride_count: rides.len(),
        preferred_distances: analyze_distance_distribution(rides),
        elevation_tolerance: analyze_elevation_tolerance(rides),
        frequent_areas,
        direction_preferences,
        route_segments: database.ranked_entries(),
        route_templates,
    };

    info!(
        "[Patterns] Analysed {} rides in {:?}: {} key points, {} areas, {} segments -> {} entries, {} templates",
        rides.len(),
        start.elapsed(),
        all_key_positions.len(),
        profile.frequent_areas.len(),
        segment_count,
        profile.route_segments.len(),
        profile.route_templates.len()
    );

    profile
}
