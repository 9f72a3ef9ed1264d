//! # Route Segment Extraction and Deduplication
//!
//! Chops rides into ~2 km segments and merges segments that describe the same
//! stretch of road across rides.
//!
//! ## Extraction
//! Points are walked in order while accumulating planar distance. A segment is
//! closed once the accumulated distance reaches the target length, or at the last
//! point of the ride. The closing point also opens the next segment so consecutive
//! segments share an endpoint. Segments with fewer than the minimum number of
//! points are dropped; the final partial chunk is kept whatever its length.
//!
//! ## Merge Rule
//! Two segments are the same entry when their starts are within 0.5 km, their ends
//! are within 0.5 km, and their bearings differ by less than 30°. Merging bumps the
//! usage count, keeps the most recent use, and keeps whichever coordinate list has
//! more points.
//!
//! Insertion scans every existing entry, so building a database is
//! O(segments × entries). That is fine for one rider's history; a multi-rider index
//! would want an R-tree over segment start points.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::geo_utils::{bearing_degrees, bearing_difference, planar_distance_km};
use crate::{GpsPoint, RideRecord};

/// A bounded-length chunk of a ride's path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    /// Ordered path coordinates
    pub coordinates: Vec<GpsPoint>,
    pub start_point: GpsPoint,
    pub end_point: GpsPoint,
    /// Accumulated planar length in kilometers
    pub distance_km: f64,
    /// Bearing from start to end, degrees `[0, 360)`
    pub bearing_deg: f64,
    pub source_ride_id: String,
    /// Unix timestamp in milliseconds of the source ride
    pub timestamp: i64,
}

impl RouteSegment {
    /// Build a segment from an ordered run of points.
    pub fn from_points(
        coordinates: Vec<GpsPoint>,
        source_ride_id: &str,
        timestamp: i64,
        min_points: usize,
    ) -> Result<Self> {
        let point_count = coordinates.len();
        let minimum = min_points.max(2);
        let (start_point, end_point) = coordinates
            .first()
            .zip(coordinates.last())
            .filter(|_| point_count >= minimum)
            .map(|(first, last)| (*first, *last))
            .ok_or_insufficient_points(source_ride_id, point_count, minimum)?;
        let distance_km = coordinates
            .windows(2)
            .map(|w| planar_distance_km(&w[0], &w[1]))
            .sum();

        Ok(Self {
            bearing_deg: bearing_degrees(&start_point, &end_point),
            coordinates,
            start_point,
            end_point,
            distance_km,
            source_ride_id: source_ride_id.to_string(),
            timestamp,
        })
    }

    /// The same segment traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        let mut coordinates = self.coordinates.clone();
        coordinates.reverse();
        Self {
            coordinates,
            start_point: self.end_point,
            end_point: self.start_point,
            distance_km: self.distance_km,
            bearing_deg: bearing_degrees(&self.end_point, &self.start_point),
            source_ride_id: self.source_ride_id.clone(),
            timestamp: self.timestamp,
        }
    }

    /// Whether two segments describe the same stretch of road in the same direction.
    pub fn matches(&self, other: &RouteSegment, endpoint_km: f64, bearing_tolerance_deg: f64) -> bool {
        planar_distance_km(&self.start_point, &other.start_point) < endpoint_km
            && planar_distance_km(&self.end_point, &other.end_point) < endpoint_km
            && bearing_difference(self.bearing_deg, other.bearing_deg) < bearing_tolerance_deg
    }
}

/// Split one ride into segments of roughly `segment_length_km`.
///
/// Rides with fewer than `min_ride_points` points yield nothing, and so do rides
/// with fewer than two points whatever the minimum.
pub fn extract_segments(
    ride: &RideRecord,
    segment_length_km: f64,
    min_segment_points: usize,
    min_ride_points: usize,
) -> Vec<RouteSegment> {
    let min_ride_points = min_ride_points.max(2);
    if ride.track_points.len() < min_ride_points {
        debug!(
            "[Segments] Skipping ride {} ({} points < {})",
            ride.id,
            ride.track_points.len(),
            min_ride_points
        );
        return vec![];
    }

    let positions = ride.positions();
    let last = positions.len() - 1;
    let mut segments = Vec::new();
    let mut current: Vec<GpsPoint> = vec![positions[0]];
    let mut accumulated = 0.0;

    for i in 1..positions.len() {
        accumulated += planar_distance_km(&positions[i - 1], &positions[i]);
        current.push(positions[i]);

        if accumulated >= segment_length_km || i == last {
            let chunk = std::mem::replace(&mut current, vec![positions[i]]);
            match RouteSegment::from_points(chunk, &ride.id, ride.recorded_at, min_segment_points) {
                Ok(segment) => segments.push(segment),
                Err(e) => debug!("[Segments] Dropping chunk: {}", e),
            }
            accumulated = 0.0;
        }
    }

    segments
}

/// A deduplicated segment with usage statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDatabaseEntry {
    pub segment: RouteSegment,
    /// Number of merged observations (at least 1)
    pub usage_count: u32,
    /// Most recent observation, Unix milliseconds
    pub last_used_epoch_ms: i64,
    /// Quality label; every mined entry is "proven"
    pub quality: String,
}

impl SegmentDatabaseEntry {
    fn new(segment: RouteSegment) -> Self {
        Self {
            last_used_epoch_ms: segment.timestamp,
            segment,
            usage_count: 1,
            quality: "proven".to_string(),
        }
    }

    /// Ranking score: `0.7 * usage_count + 0.3 * (last_used / 1e9)`.
    pub fn rank_score(&self) -> f64 {
        0.7 * self.usage_count as f64 + 0.3 * (self.last_used_epoch_ms as f64 / 1e9)
    }
}

/// Merged segments across all rides.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDatabase {
    entries: Vec<SegmentDatabaseEntry>,
    endpoint_km: f64,
    bearing_tolerance_deg: f64,
}

impl SegmentDatabase {
    pub fn new(endpoint_km: f64, bearing_tolerance_deg: f64) -> Self {
        Self {
            entries: Vec::new(),
            endpoint_km,
            bearing_tolerance_deg,
        }
    }

    /// Build a database from segments in the given order.
    pub fn build(
        segments: impl IntoIterator<Item = RouteSegment>,
        endpoint_km: f64,
        bearing_tolerance_deg: f64,
    ) -> Self {
        let mut db = Self::new(endpoint_km, bearing_tolerance_deg);
        for segment in segments {
            db.insert(segment);
        }
        db
    }

    /// Merge a segment into the first matching entry, or add a new entry.
    pub fn insert(&mut self, segment: RouteSegment) {
        let endpoint_km = self.endpoint_km;
        let tolerance = self.bearing_tolerance_deg;

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.segment.matches(&segment, endpoint_km, tolerance))
        {
            entry.usage_count += 1;
            entry.last_used_epoch_ms = entry.last_used_epoch_ms.max(segment.timestamp);
            if segment.coordinates.len() > entry.segment.coordinates.len() {
                debug!(
                    "[Segments] Upgrading entry from {} to {} points (ride {})",
                    entry.segment.coordinates.len(),
                    segment.coordinates.len(),
                    segment.source_ride_id
                );
                entry.segment = segment;
            }
        } else {
            self.entries.push(SegmentDatabaseEntry::new(segment));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[SegmentDatabaseEntry] {
        &self.entries
    }

    /// Entries sorted by [`SegmentDatabaseEntry::rank_score`], best first.
    pub fn ranked_entries(&self) -> Vec<SegmentDatabaseEntry> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.rank_score().total_cmp(&a.rank_score()));
        ranked
    }
}
