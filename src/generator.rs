//! # Route Candidate Generation
//!
//! Turns a [`RouteRequest`] and a [`RidingPatternProfile`] into concrete route
//! candidates in two stages:
//!
//! 1. **Planning** (sync): pick a target distance, lay out waypoints for each
//!    variant, and optionally pick one known historical segment.
//! 2. **Realization** (async): snap synthesized waypoints to the road network via a
//!    [`MapMatcher`], then sample elevation. Calls run with bounded concurrency and
//!    per-call deadlines. Any failure degrades that one candidate to a
//!    deterministic octagon of the target length.
//!
//! ## Loop Geometry
//! Radius `r = target / 2π × 0.9`. Four waypoints sit at 90° steps from a base
//! bearing. A frequent area within `2r` of a slot replaces that waypoint outright;
//! otherwise the slot is jittered in radius (`×[0.7, 1.3]`) and angle (`±0.25 rad`).
//!
//! Jitter draws from a [`StdRng`] seeded from [`GeneratorConfig::seed`], so a
//! fixed seed reproduces the exact geometry.

use std::f64::consts::PI;
use std::future::Future;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::clustering::FrequentArea;
use crate::directions::sector_for_bearing;
use crate::error::{PlannerError, Result};
use crate::geo_utils::{destination_point, haversine_km, polyline_length};
use crate::patterns::RidingPatternProfile;
use crate::providers::{ElevationProvider, ElevationSample, MapMatcher, MatchedRoute};
use crate::segments::{RouteSegment, SegmentDatabaseEntry};
use crate::templates::RouteShape;
use crate::GpsPoint;

// =============================================================================
// Request Types
// =============================================================================

/// What the rider wants out of the ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingGoal {
    Recovery,
    Endurance,
    Intervals,
    Hills,
    /// Any other goal
    General,
}

impl TrainingGoal {
    pub const ALL: [TrainingGoal; 5] = [
        TrainingGoal::Recovery,
        TrainingGoal::Endurance,
        TrainingGoal::Intervals,
        TrainingGoal::Hills,
        TrainingGoal::General,
    ];

    /// Planning speed in km/h.
    pub fn speed_kmh(&self) -> f64 {
        match self {
            TrainingGoal::Recovery => 20.0,
            TrainingGoal::Endurance => 25.0,
            TrainingGoal::Intervals => 22.0,
            TrainingGoal::Hills => 18.0,
            TrainingGoal::General => 23.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingGoal::Recovery => "recovery",
            TrainingGoal::Endurance => "endurance",
            TrainingGoal::Intervals => "intervals",
            TrainingGoal::Hills => "hills",
            TrainingGoal::General => "general",
        }
    }
}

/// A route generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: GpsPoint,
    /// Time budget in minutes
    pub time_available_minutes: f64,
    pub goal: TrainingGoal,
    pub shape: RouteShape,
    /// Explicit distance, used instead of `time × speed` when set
    pub target_distance_km: Option<f64>,
}

impl RouteRequest {
    pub fn new(start: GpsPoint, time_available_minutes: f64, goal: TrainingGoal, shape: RouteShape) -> Self {
        Self {
            start,
            time_available_minutes,
            goal,
            shape,
            target_distance_km: None,
        }
    }

    pub fn with_target_distance(mut self, km: f64) -> Self {
        self.target_distance_km = Some(km);
        self
    }

    /// Distance before any history-based adjustment.
    pub fn baseline_distance_km(&self) -> f64 {
        self.target_distance_km
            .unwrap_or(self.time_available_minutes / 60.0 * self.goal.speed_kmh())
    }
}

// =============================================================================
// Candidate Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

/// Climb rate classification: meters gained per kilometer.
///
/// ```
/// use ride_planner::{difficulty, Difficulty};
///
/// assert_eq!(difficulty(20.0, 150.0), Difficulty::Easy);
/// assert_eq!(difficulty(20.0, 300.0), Difficulty::Moderate);
/// assert_eq!(difficulty(20.0, 600.0), Difficulty::Hard);
/// ```
pub fn difficulty(distance_km: f64, elevation_gain_m: f64) -> Difficulty {
    let rate = climb_rate(distance_km, elevation_gain_m);
    if rate < 10.0 {
        Difficulty::Easy
    } else if rate < 25.0 {
        Difficulty::Moderate
    } else {
        Difficulty::Hard
    }
}

/// Meters of climbing per kilometer, 0 for a non-positive distance.
pub(crate) fn climb_rate(distance_km: f64, elevation_gain_m: f64) -> f64 {
    if distance_km > 0.0 {
        elevation_gain_m / distance_km
    } else {
        0.0
    }
}

/// Where a candidate's geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Synthesized waypoints snapped by the map matcher
    Synthesized,
    /// A known segment from the rider's history
    Segments,
    /// Octagon used when matching failed
    Fallback,
}

/// A realized route ready for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    pub name: String,
    pub coordinates: Vec<GpsPoint>,
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub difficulty: Difficulty,
    /// Variant label, e.g. `loop_ne`
    pub pattern: String,
    pub shape: RouteShape,
    /// Trust in the geometry, `[0, 1]`
    pub confidence: f64,
    pub training_goal: TrainingGoal,
    pub source: CandidateSource,
}

/// Waypoints for one candidate, before realization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePlan {
    pub name: String,
    pub pattern: String,
    pub shape: RouteShape,
    pub source: CandidateSource,
    /// Base bearing of the variant, also orients its fallback octagon
    pub bearing_deg: f64,
    pub waypoints: Vec<GpsPoint>,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for candidate generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Synthesized variants per request. Default: 4
    pub variants_per_request: usize,
    /// Loop radius multiplier on `target / 2π`. Default: 0.9
    pub loop_radius_factor: f64,
    /// Lower bound of the waypoint radius scale. Default: 0.7
    pub radius_jitter_min: f64,
    /// Upper bound of the waypoint radius scale. Default: 1.3
    pub radius_jitter_max: f64,
    /// Maximum waypoint angle jitter in radians. Default: 0.25
    pub angle_jitter_rad: f64,
    /// Segment endpoints must be this close to the start, km. Default: 5.0
    pub segment_search_radius_km: f64,
    /// Segment length limit as a multiple of the target. Default: 1.5
    pub segment_max_length_ratio: f64,
    /// Matches below this confidence fall back to the octagon. Default: 0.5
    pub min_match_confidence: f64,
    /// Confidence of fallback geometry. Default: 0.3
    pub mock_confidence: f64,
    /// Confidence of a known-segment candidate. Default: 0.95
    pub segment_confidence: f64,
    /// Deadline for a single collaborator call, milliseconds. Default: 10000
    pub call_timeout_ms: u64,
    /// Collaborator calls in flight at once. Default: 4
    pub max_concurrent_calls: usize,
    /// Routing profile passed to the map matcher. Default: "cycling"
    pub routing_profile: String,
    /// Seed for waypoint jitter; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            variants_per_request: 4,
            loop_radius_factor: 0.9,
            radius_jitter_min: 0.7,
            radius_jitter_max: 1.3,
            angle_jitter_rad: 0.25,
            segment_search_radius_km: 5.0,
            segment_max_length_ratio: 1.5,
            min_match_confidence: 0.5,
            mock_confidence: 0.3,
            segment_confidence: 0.95,
            call_timeout_ms: 10_000,
            max_concurrent_calls: 4,
            routing_profile: "cycling".to_string(),
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Check ranges that would otherwise panic or stall generation.
    pub fn validate(&self) -> Result<()> {
        if !(self.radius_jitter_min > 0.0 && self.radius_jitter_min <= self.radius_jitter_max) {
            return Err(PlannerError::Config {
                message: format!(
                    "radius jitter range [{}, {}] is empty or non-positive",
                    self.radius_jitter_min, self.radius_jitter_max
                ),
            });
        }
        if !(self.angle_jitter_rad >= 0.0) {
            return Err(PlannerError::Config {
                message: format!("angle jitter {} must be >= 0", self.angle_jitter_rad),
            });
        }
        if self.max_concurrent_calls == 0 {
            return Err(PlannerError::Config {
                message: "max_concurrent_calls must be at least 1".to_string(),
            });
        }
        if self.call_timeout_ms == 0 {
            return Err(PlannerError::Config {
                message: "call_timeout_ms must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Random source for waypoint jitter.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

// =============================================================================
// Target Distance
// =============================================================================

/// Target distance for a request, nudged toward the rider's usual distance.
///
/// Without distance history the baseline is returned unchanged. Otherwise:
/// - recovery: `min(target, mean × 0.8)`
/// - endurance: `max(target, mean × 1.2)`
/// - other goals: `target × (1 − w) + mean × w` with `w = 0.3` when the rider's
///   distances vary and `0.15` when they don't
pub fn adjusted_target_distance(request: &RouteRequest, profile: &RidingPatternProfile) -> f64 {
    let target = request.baseline_distance_km();
    let distances = &profile.preferred_distances;
    if distances.sample_count == 0 {
        return target;
    }

    let mean = distances.mean;
    let adjusted = match request.goal {
        TrainingGoal::Recovery => target.min(mean * 0.8),
        TrainingGoal::Endurance => target.max(mean * 1.2),
        _ => {
            let confidence_factor = if distances.range.has_spread() { 1.0 } else { 0.5 };
            let w = confidence_factor * 0.3;
            target * (1.0 - w) + mean * w
        }
    };

    debug!(
        "[Generator] Target {:.1} km -> {:.1} km ({} goal, history mean {:.1} km)",
        target,
        adjusted,
        request.goal.as_str(),
        mean
    );
    adjusted
}

// =============================================================================
// Waypoint Geometry
// =============================================================================

/// Closed loop waypoints: `[start, w1, w2, w3, w4, start]`.
pub fn generate_loop_waypoints<R: Rng>(
    start: GpsPoint,
    target_km: f64,
    base_bearing_deg: f64,
    frequent_areas: &[FrequentArea],
    config: &GeneratorConfig,
    rng: &mut R,
) -> Vec<GpsPoint> {
    let radius = target_km / (2.0 * PI) * config.loop_radius_factor;
    let mut used_areas = vec![false; frequent_areas.len()];
    let mut waypoints = Vec::with_capacity(6);
    waypoints.push(start);

    for k in 0..4 {
        let slot_bearing = base_bearing_deg + k as f64 * 90.0;
        let ideal = destination_point(&start, slot_bearing, radius);

        let nearest_area = frequent_areas
            .iter()
            .enumerate()
            .filter(|(i, _)| !used_areas[*i])
            .map(|(i, area)| (i, haversine_km(&area.center, &ideal)))
            .filter(|(_, d)| *d <= 2.0 * radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let waypoint = match nearest_area {
            Some((i, d)) => {
                used_areas[i] = true;
                debug!(
                    "[Generator] Slot {} uses frequent area {} ({:.2} km from ideal)",
                    k, i, d
                );
                frequent_areas[i].center
            }
            None => {
                let scale = rng.gen_range(config.radius_jitter_min..=config.radius_jitter_max);
                let jitter = if config.angle_jitter_rad > 0.0 {
                    rng.gen_range(-config.angle_jitter_rad..=config.angle_jitter_rad)
                } else {
                    0.0
                };
                destination_point(&start, slot_bearing + jitter.to_degrees(), radius * scale)
            }
        };
        waypoints.push(waypoint);
    }

    waypoints.push(start);
    waypoints
}

/// Out-and-back waypoints: `[start, turnaround, start]` with the turnaround at
/// half the target distance.
pub fn generate_out_and_back_waypoints(start: GpsPoint, target_km: f64, bearing_deg: f64) -> Vec<GpsPoint> {
    vec![start, destination_point(&start, bearing_deg, target_km / 2.0), start]
}

/// Closed regular octagon whose perimeter equals `target_km`, with one vertex at
/// `start`. The centre lies along `bearing_deg` from the start.
///
/// Used as geometry of last resort when map matching is unavailable.
pub fn mock_octagon_route(start: GpsPoint, target_km: f64, bearing_deg: f64) -> Vec<GpsPoint> {
    // side = target / 8 = 2R·sin(π/8)
    let circumradius = target_km / (16.0 * (PI / 8.0).sin());
    let centre = destination_point(&start, bearing_deg, circumradius);
    let back_to_start = bearing_deg + 180.0;

    let mut coords: Vec<GpsPoint> = std::iter::once(start)
        .chain((1..8).map(|k| destination_point(&centre, back_to_start + k as f64 * 45.0, circumradius)))
        .collect();
    coords.push(start);
    coords
}

/// The known segment nearest to the start, oriented to begin at its closer end.
///
/// Only segments with an endpoint within the search radius and a length of at
/// most `segment_max_length_ratio × target` qualify. This picks one segment; it
/// does not chain several.
pub fn select_segment_candidate(
    start: GpsPoint,
    target_km: f64,
    entries: &[SegmentDatabaseEntry],
    config: &GeneratorConfig,
) -> Option<RouteSegment> {
    let max_length = target_km * config.segment_max_length_ratio;

    let (entry, d_start, d_end) = entries
        .iter()
        .filter(|e| e.segment.distance_km <= max_length)
        .map(|e| {
            (
                e,
                haversine_km(&start, &e.segment.start_point),
                haversine_km(&start, &e.segment.end_point),
            )
        })
        .filter(|(_, ds, de)| ds.min(*de) <= config.segment_search_radius_km)
        .min_by(|a, b| a.1.min(a.2).total_cmp(&b.1.min(b.2)))?;

    if d_end < d_start {
        Some(entry.segment.reversed())
    } else {
        Some(entry.segment.clone())
    }
}

/// Base bearings for the variants: preferred directions first, then the cardinal
/// points, then 45° offsets.
fn variant_bearings(profile: &RidingPatternProfile, count: usize) -> Vec<f64> {
    let mut bearings: Vec<f64> = profile
        .direction_preferences
        .iter()
        .map(|p| p.bearing_deg)
        .take(count)
        .collect();

    for candidate in [0.0, 90.0, 180.0, 270.0, 45.0, 135.0, 225.0, 315.0] {
        if bearings.len() >= count {
            break;
        }
        if !bearings.iter().any(|b| (*b - candidate).abs() < 1e-9) {
            bearings.push(candidate);
        }
    }

    // More variants than compass points: repeat with a small offset
    let mut k = 0;
    while bearings.len() < count {
        bearings.push(bearings[k % 8] + 22.5);
        k += 1;
    }
    bearings
}

fn shape_title(shape: RouteShape) -> &'static str {
    match shape {
        RouteShape::Loop => "Loop",
        RouteShape::OutBack => "Out & Back",
        RouteShape::PointToPoint => "Point to Point",
    }
}

/// Plan every candidate for a request, in generation order.
///
/// Synthesized variants come first, followed by the known-segment candidate when
/// one qualifies.
pub fn plan_candidates<R: Rng>(
    request: &RouteRequest,
    profile: &RidingPatternProfile,
    target_km: f64,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Vec<CandidatePlan> {
    let mut plans: Vec<CandidatePlan> = variant_bearings(profile, config.variants_per_request)
        .into_iter()
        .enumerate()
        .map(|(i, bearing)| {
            let waypoints = match request.shape {
                RouteShape::Loop => generate_loop_waypoints(
                    request.start,
                    target_km,
                    bearing,
                    &profile.frequent_areas,
                    config,
                    rng,
                ),
                RouteShape::OutBack | RouteShape::PointToPoint => {
                    generate_out_and_back_waypoints(request.start, target_km, bearing)
                }
            };
            let sector = format!("{:?}", sector_for_bearing(bearing));
            CandidatePlan {
                name: format!("{} {} {}", sector, shape_title(request.shape), i + 1),
                pattern: format!("{}_{}", request.shape.as_str(), sector.to_lowercase()),
                shape: request.shape,
                source: CandidateSource::Synthesized,
                bearing_deg: bearing,
                waypoints,
            }
        })
        .collect();

    if let Some(segment) =
        select_segment_candidate(request.start, target_km, &profile.route_segments, config)
    {
        debug!(
            "[Generator] Known segment from ride {} ({:.1} km) qualifies",
            segment.source_ride_id, segment.distance_km
        );
        plans.push(CandidatePlan {
            name: "Known Segment".to_string(),
            pattern: "known_segment".to_string(),
            shape: RouteShape::PointToPoint,
            source: CandidateSource::Segments,
            bearing_deg: segment.bearing_deg,
            waypoints: segment.coordinates,
        });
    }

    plans
}

// =============================================================================
// Realization
// =============================================================================

/// Run a collaborator call with a deadline, mapping expiry to [`PlannerError::Timeout`].
pub(crate) async fn with_deadline<T, F>(provider: &str, after: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(PlannerError::Timeout {
            provider: provider.to_string(),
            after_ms: after.as_millis() as u64,
        }),
    }
}

/// Total climb and descent in meters across consecutive samples.
pub fn elevation_gain_loss(samples: &[ElevationSample]) -> (f64, f64) {
    samples.windows(2).fold((0.0, 0.0), |(gain, loss), w| {
        let delta = w[1].elevation_m - w[0].elevation_m;
        if delta > 0.0 {
            (gain + delta, loss)
        } else {
            (gain, loss - delta)
        }
    })
}

fn usable_match(matched: MatchedRoute, minimum: f64) -> Result<MatchedRoute> {
    if matched.coordinates.is_empty() {
        return Err(PlannerError::Provider {
            provider: "map_matcher".to_string(),
            message: "match returned no coordinates".to_string(),
        });
    }
    if !(matched.confidence >= minimum) {
        return Err(PlannerError::LowConfidence {
            confidence: matched.confidence,
            minimum,
        });
    }
    Ok(matched)
}

struct RealizeContext<'a> {
    request: &'a RouteRequest,
    target_km: f64,
    matcher: &'a dyn MapMatcher,
    elevation: &'a dyn ElevationProvider,
    config: &'a GeneratorConfig,
}

async fn realize_one(plan: CandidatePlan, ctx: &RealizeContext<'_>) -> RouteCandidate {
    let config = ctx.config;

    let (coordinates, distance_km, confidence, source) = match plan.source {
        CandidateSource::Segments => {
            let km = polyline_length(&plan.waypoints) / 1000.0;
            (plan.waypoints, km, config.segment_confidence, CandidateSource::Segments)
        }
        _ => {
            let matched = with_deadline(
                "map_matcher",
                config.call_timeout(),
                ctx.matcher.match_route(&plan.waypoints, &config.routing_profile),
            )
            .await
            .and_then(|m| usable_match(m, config.min_match_confidence));

            match matched {
                Ok(m) => {
                    let km = if m.distance_m > 0.0 {
                        m.distance_m / 1000.0
                    } else {
                        polyline_length(&m.coordinates) / 1000.0
                    };
                    (m.coordinates, km, m.confidence, CandidateSource::Synthesized)
                }
                Err(e) => {
                    warn!("[Generator] {} falls back to mock geometry: {}", plan.name, e);
                    let coords = mock_octagon_route(ctx.request.start, ctx.target_km, plan.bearing_deg);
                    (coords, ctx.target_km, config.mock_confidence, CandidateSource::Fallback)
                }
            }
        }
    };

    let (gain, loss) = match with_deadline(
        "elevation",
        config.call_timeout(),
        ctx.elevation.sample(&coordinates),
    )
    .await
    {
        Ok(samples) => elevation_gain_loss(&samples),
        Err(e) => {
            warn!("[Generator] No elevation for {}: {}", plan.name, e);
            (0.0, 0.0)
        }
    };

    RouteCandidate {
        name: plan.name,
        coordinates,
        distance_km,
        elevation_gain_m: gain,
        elevation_loss_m: loss,
        difficulty: difficulty(distance_km, gain),
        pattern: plan.pattern,
        shape: plan.shape,
        confidence,
        training_goal: ctx.request.goal,
        source,
    }
}

/// Realize every plan against the collaborators.
///
/// At most `max_concurrent_calls` candidates are in flight. Output order matches
/// `plans` regardless of completion order, and every plan yields a candidate.
pub async fn realize_candidates(
    plans: Vec<CandidatePlan>,
    request: &RouteRequest,
    target_km: f64,
    matcher: &dyn MapMatcher,
    elevation: &dyn ElevationProvider,
    config: &GeneratorConfig,
) -> Vec<RouteCandidate> {
    let start = Instant::now();
    let count = plans.len();
    let ctx = RealizeContext {
        request,
        target_km,
        matcher,
        elevation,
        config,
    };

    let candidates: Vec<RouteCandidate> = stream::iter(plans)
        .map(|plan| realize_one(plan, &ctx))
        .buffered(config.max_concurrent_calls.max(1))
        .collect()
        .await;

    let fallbacks = candidates
        .iter()
        .filter(|c| c.source == CandidateSource::Fallback)
        .count();
    info!(
        "[Generator] Realized {} candidates in {:?} ({} fallback)",
        count,
        start.elapsed(),
        fallbacks
    );
    candidates
}
