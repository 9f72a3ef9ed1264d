//! # Ride Planner
//!
//! Ride pattern mining and personalised route synthesis for cyclists.
//!
//! This library provides:
//! - Habit mining over historical rides: key points, frequent areas, reusable
//!   segments, distance/elevation distributions and preferred directions
//! - Candidate route synthesis (loop, out-and-back, point-to-point, known segments)
//! - Multi-criteria scoring and ranking of candidates
//!
//! ## Features
//!
//! - **`parallel`** - Run per-ride mining passes with rayon
//! - **`http`** - Enable HTTP map-matching, elevation and weather collaborators
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use ride_planner::{analyze_riding_patterns, RideRecord, RideSummary, TrackPoint};
//!
//! let points: Vec<TrackPoint> = (0..20)
//!     .map(|i| TrackPoint::new(46.95 + i as f64 * 0.002, 7.44))
//!     .collect();
//!
//! let ride = RideRecord {
//!     id: "ride-1".to_string(),
//!     track_points: points,
//!     summary: RideSummary { distance_km: Some(4.4), elevation_gain_m: Some(35.0) },
//!     recorded_at: 1_700_000_000_000,
//! };
//!
//! let profile = analyze_riding_patterns(&[ride]);
//! assert_eq!(profile.ride_count, 1);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, PlannerError, Result};

// Geographic utilities (distance, bearing, percentiles)
pub mod geo_utils;

// Turn-based track reduction
pub mod track_reducer;
pub use track_reducer::{extract_key_points, KeyPoint};

// Greedy spatial clustering into frequent areas
pub mod clustering;
pub use clustering::{cluster_locations, find_frequent_areas, FrequentArea, LocationCluster};

// Fixed-length segment extraction and cross-ride deduplication
pub mod segments;
pub use segments::{extract_segments, RouteSegment, SegmentDatabase, SegmentDatabaseEntry};

// Distance and elevation distributions
pub mod statistics;
pub use statistics::{
    analyze_distance_distribution, analyze_elevation_tolerance, DistanceDistribution,
    DistanceRange, ElevationCategory, ElevationTolerance,
};

// Bearing-sector histogram
pub mod directions;
pub use directions::{analyze_direction_preferences, CompassDirection, DirectionPreference};

// Per-ride route shape classification
pub mod templates;
pub use templates::{build_route_templates, classify_route_shape, RouteShape, RouteTemplate};

// Aggregated riding profile
pub mod patterns;
pub use patterns::{analyze_riding_patterns, PatternConfig, RidingPatternProfile};

// External collaborator contracts
pub mod providers;
pub use providers::{
    ElevationProvider, ElevationSample, InMemoryRideStore, MapMatcher, MatchedRoute,
    RideHistoryStore, WeatherConditions, WeatherProvider,
};

// Candidate route synthesis
pub mod generator;
pub use generator::{
    difficulty, CandidateSource, Difficulty, GeneratorConfig, RouteCandidate, RouteRequest,
    TrainingGoal,
};

// Multi-criteria ranking
pub mod scoring;
pub use scoring::{rank_routes, score_route, ScoredRoute, ScoringConfig, ScoringContext};

// Request orchestration
pub mod planner;
pub use planner::RoutePlanner;

// HTTP collaborators
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{HttpTransport, MapboxMatcher, OpenElevationClient, OpenWeatherClient};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use ride_planner::GpsPoint;
/// let point = GpsPoint::new(46.9480, 7.4474); // Bern
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// `[lon, lat]` pair, the order map providers use on the wire.
    pub fn to_lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    pub fn from_lon_lat(coord: [f64; 2]) -> Self {
        Self::new(coord[1], coord[0])
    }
}

/// One recorded sample of a ride.
///
/// Samples are ordered by their position in [`RideRecord::track_points`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters, if the recording device captured it
    pub elevation: Option<f64>,
    /// Unix timestamp in milliseconds
    pub timestamp: Option<i64>,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            timestamp: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Summary statistics stored alongside a ride.
///
/// Both fields are optional: recordings from some devices or imports carry
/// no totals. Missing and non-positive values are ignored by the profiler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RideSummary {
    /// Total distance in kilometers
    pub distance_km: Option<f64>,
    /// Total climbing in meters
    pub elevation_gain_m: Option<f64>,
}

/// One completed ride. Read-only input to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRecord {
    pub id: String,
    pub track_points: Vec<TrackPoint>,
    pub summary: RideSummary,
    /// Unix timestamp in milliseconds
    pub recorded_at: i64,
}

impl RideRecord {
    /// Track positions without elevation/time metadata.
    pub fn positions(&self) -> Vec<GpsPoint> {
        self.track_points.iter().map(TrackPoint::position).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
