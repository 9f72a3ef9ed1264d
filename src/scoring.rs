//! # Route Scoring
//!
//! Multi-criteria ranking of realized candidates:
//!
//! ```text
//! score = clamp01(0.5 + goal + weather + time + quality + pattern)
//! ```
//!
//! | Term | Rule |
//! |------|------|
//! | goal | hills +0.2 if climb rate > 20 m/km else −0.1; recovery +0.2 if < 15 else −0.1; intervals +0.15 if wind factor > 0.8; others +0.1 |
//! | weather | goal-rated conditions × 0.2, 0 without weather |
//! | time | ride time at 23 km/h within 10 min of budget +0.2, within 20 min +0.1, else −0.1 |
//! | quality | +0.1 if confidence > 0.8, plus (wind factor − 0.8) × 0.5 |
//! | pattern | overall pattern confidence × (distance + climb + area bonuses) |

use log::debug;
use serde::{Deserialize, Serialize};

use crate::generator::{climb_rate, RouteCandidate, TrainingGoal};
use crate::geo_utils::{bearing_degrees, compute_center, haversine_km};
use crate::patterns::RidingPatternProfile;
use crate::providers::WeatherConditions;
use crate::GpsPoint;

/// Configuration for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Speed used to estimate ride time, km/h. Default: 23
    pub estimated_speed_kmh: f64,
    /// Number of routes returned. Default: 4
    pub max_routes: usize,
    /// Wind factor when no weather is available. Default: 0.8
    pub neutral_wind_factor: f64,
    /// Frequent area bonus radius around the route centroid, km. Default: 5.0
    pub area_bonus_radius_km: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            estimated_speed_kmh: 23.0,
            max_routes: 4,
            neutral_wind_factor: 0.8,
            area_bonus_radius_km: 5.0,
        }
    }
}

/// Inputs shared by every candidate in one request.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub goal: TrainingGoal,
    pub time_available_minutes: f64,
    pub weather: Option<WeatherConditions>,
    pub profile: &'a RidingPatternProfile,
}

/// Individual score terms before clamping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub goal: f64,
    pub weather: f64,
    pub time: f64,
    pub quality: f64,
    pub pattern: f64,
}

impl ScoreBreakdown {
    /// `clamp01(0.5 + sum of terms)`.
    pub fn total(&self) -> f64 {
        (0.5 + self.goal + self.weather + self.time + self.quality + self.pattern).clamp(0.0, 1.0)
    }
}

/// A candidate with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRoute {
    pub route: RouteCandidate,
    /// Final score in `[0, 1]`
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Share of the route that rides into the wind, as a factor in `[0, 1]`.
///
/// `clamp01(1 − 0.4 × headwind_share × min(wind_speed / 10, 1))`, where
/// `headwind_share` is the length-weighted mean of `cos(leg bearing − wind from)`.
/// Returns `neutral` without weather or without any leg of non-zero length.
pub fn wind_factor(coordinates: &[GpsPoint], weather: Option<&WeatherConditions>, neutral: f64) -> f64 {
    let Some(weather) = weather else {
        return neutral;
    };

    let (weighted, total) = coordinates
        .windows(2)
        .map(|w| (haversine_km(&w[0], &w[1]), bearing_degrees(&w[0], &w[1])))
        .filter(|(len, _)| *len > 0.0)
        .fold((0.0, 0.0), |(weighted, total), (len, bearing)| {
            let into_wind = (bearing - weather.wind_degrees).to_radians().cos();
            (weighted + len * into_wind, total + len)
        });

    if total <= 0.0 {
        return neutral;
    }

    let headwind_share = weighted / total;
    let strength = (weather.wind_speed.max(0.0) / 10.0).min(1.0);
    (1.0 - 0.4 * headwind_share * strength).clamp(0.0, 1.0)
}

fn goal_score(goal: TrainingGoal, rate: f64, wind: f64) -> f64 {
    match goal {
        TrainingGoal::Hills => {
            if rate > 20.0 {
                0.2
            } else {
                -0.1
            }
        }
        TrainingGoal::Recovery => {
            if rate < 15.0 {
                0.2
            } else {
                -0.1
            }
        }
        TrainingGoal::Intervals => {
            if wind > 0.8 {
                0.15
            } else {
                0.0
            }
        }
        TrainingGoal::Endurance | TrainingGoal::General => 0.1,
    }
}

fn time_score(distance_km: f64, available_minutes: f64, speed_kmh: f64) -> f64 {
    let estimated_minutes = distance_km / speed_kmh * 60.0;
    let diff = (estimated_minutes - available_minutes).abs();
    if diff <= 10.0 {
        0.2
    } else if diff <= 20.0 {
        0.1
    } else {
        -0.1
    }
}

fn pattern_score(route: &RouteCandidate, profile: &RidingPatternProfile, config: &ScoringConfig) -> f64 {
    if !profile.has_history() {
        return 0.0;
    }

    let mut bonus = 0.0;
    let distances = &profile.preferred_distances;

    if distances.sample_count > 0 && distances.mean > 0.0 {
        let relative = (route.distance_km - distances.mean) / distances.mean;
        if relative.abs() <= 0.2 {
            bonus += 0.15;
        } else if relative.abs() <= 0.4 {
            bonus += 0.1;
        } else if relative > 1.0 {
            bonus -= 0.1;
        }

        let elevation = &profile.elevation_tolerance;
        if elevation.sample_count > 0 && elevation.preferred > 0.0 {
            let preferred_rate = elevation.preferred / distances.mean;
            let rate = climb_rate(route.distance_km, route.elevation_gain_m);
            if (rate - preferred_rate).abs() / preferred_rate <= 0.3 {
                bonus += 0.1;
            } else {
                bonus -= 0.05;
            }
        }
    }

    if !route.coordinates.is_empty() {
        let centroid = compute_center(&route.coordinates);
        if profile
            .frequent_areas
            .iter()
            .any(|a| haversine_km(&a.center, &centroid) <= config.area_bonus_radius_km)
        {
            bonus += 0.1;
        }
    }

    profile.overall_confidence() * bonus
}

/// Score one candidate.
pub fn score_route(route: &RouteCandidate, ctx: &ScoringContext<'_>, config: &ScoringConfig) -> ScoreBreakdown {
    let wind = wind_factor(&route.coordinates, ctx.weather.as_ref(), config.neutral_wind_factor);
    let rate = climb_rate(route.distance_km, route.elevation_gain_m);

    ScoreBreakdown {
        goal: goal_score(ctx.goal, rate, wind),
        weather: ctx.weather.map_or(0.0, |w| w.goal_score * 0.2),
        time: time_score(route.distance_km, ctx.time_available_minutes, config.estimated_speed_kmh),
        quality: (if route.confidence > 0.8 { 0.1 } else { 0.0 }) + (wind - 0.8) * 0.5,
        pattern: pattern_score(route, ctx.profile, config),
    }
}

/// Score every candidate and return the best `max_routes`, highest first.
///
/// Equal scores keep their generation order.
pub fn rank_routes(
    candidates: Vec<RouteCandidate>,
    ctx: &ScoringContext<'_>,
    config: &ScoringConfig,
) -> Vec<ScoredRoute> {
    let mut scored: Vec<ScoredRoute> = candidates
        .into_iter()
        .map(|route| {
            let breakdown = score_route(&route, ctx, config);
            debug!(
                "[Scorer] {} -> {:.3} ({:?})",
                route.name,
                breakdown.total(),
                breakdown
            );
            ScoredRoute {
                route,
                score: breakdown.total(),
                breakdown,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(config.max_routes);
    scored
}
