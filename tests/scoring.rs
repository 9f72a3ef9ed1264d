//! Tests for route scoring and ranking

use ride_planner::geo_utils::destination_point;
use ride_planner::scoring::{wind_factor, ScoreBreakdown};
use ride_planner::*;

fn home() -> GpsPoint {
    GpsPoint::new(46.95, 7.44)
}

fn route(name: &str, distance_km: f64, gain: f64, confidence: f64, goal: TrainingGoal) -> RouteCandidate {
    let coordinates: Vec<GpsPoint> = (0..=8)
        .map(|i| destination_point(&home(), 0.0, distance_km * i as f64 / 8.0))
        .collect();
    RouteCandidate {
        name: name.to_string(),
        coordinates,
        distance_km,
        elevation_gain_m: gain,
        elevation_loss_m: gain,
        difficulty: difficulty(distance_km, gain),
        pattern: "loop_n".to_string(),
        shape: RouteShape::Loop,
        confidence,
        training_goal: goal,
        source: CandidateSource::Synthesized,
    }
}

fn rich_profile() -> RidingPatternProfile {
    let mut profile = RidingPatternProfile::default_profile();
    profile.ride_count = 10;
    profile.preferred_distances.sample_count = 10;
    profile.preferred_distances.mean = 30.0;
    profile.elevation_tolerance.sample_count = 10;
    profile.elevation_tolerance.preferred = 900.0;
    profile.frequent_areas.push(FrequentArea {
        center: destination_point(&home(), 0.0, 14.0),
        frequency: 8,
        confidence: 0.8,
    });
    profile.direction_preferences.push(DirectionPreference {
        direction: CompassDirection::N,
        bearing_deg: 0.0,
        frequency: 20,
        preference: 0.6,
    });
    profile
}

#[test]
fn test_score_clamped_when_bonuses_stack() {
    let profile = rich_profile();
    assert!((profile.overall_confidence() - 0.85).abs() < 1e-9);

    // Hills, 30 km (matches history), 900 m (30 m/km, matches preferred ratio),
    // wind from the south as a pure tailwind, time budget matches.
    let ctx = ScoringContext {
        goal: TrainingGoal::Hills,
        time_available_minutes: 30.0 / 23.0 * 60.0,
        weather: Some(WeatherConditions {
            wind_speed: 12.0,
            wind_degrees: 180.0,
            goal_score: 1.0,
        }),
        profile: &profile,
    };
    let candidate = route("stacked", 30.0, 900.0, 0.95, TrainingGoal::Hills);
    let breakdown = score_route(&candidate, &ctx, &ScoringConfig::default());

    assert_eq!(breakdown.goal, 0.2);
    assert!((breakdown.weather - 0.2).abs() < 1e-12);
    assert_eq!(breakdown.time, 0.2);
    assert!((breakdown.quality - 0.2).abs() < 1e-9);
    assert!(breakdown.pattern > 0.0);
    assert_eq!(breakdown.total(), 1.0);

    let ranked = rank_routes(vec![candidate], &ctx, &ScoringConfig::default());
    assert_eq!(ranked[0].score, 1.0);
}

#[test]
fn test_score_floor_when_penalties_stack() {
    let profile = rich_profile();
    // Recovery on a steep, far too long route into a strong headwind
    let ctx = ScoringContext {
        goal: TrainingGoal::Recovery,
        time_available_minutes: 30.0,
        weather: Some(WeatherConditions {
            wind_speed: 20.0,
            wind_degrees: 0.0,
            goal_score: 0.0,
        }),
        profile: &profile,
    };
    let candidate = route("punishing", 90.0, 4000.0, 0.3, TrainingGoal::Recovery);
    let breakdown = score_route(&candidate, &ctx, &ScoringConfig::default());

    assert_eq!(breakdown.goal, -0.1);
    assert_eq!(breakdown.time, -0.1);
    assert!(breakdown.quality < 0.0);
    assert!(breakdown.pattern < 0.0);
    let score = breakdown.total();
    assert!((0.0..=1.0).contains(&score));

    let synthetic = ScoreBreakdown {
        goal: -1.0,
        weather: -1.0,
        time: -1.0,
        quality: -1.0,
        pattern: -1.0,
    };
    assert_eq!(synthetic.total(), 0.0);
}

#[test]
fn test_ranking_prefers_history_match() {
    let profile = rich_profile();
    let ctx = ScoringContext {
        goal: TrainingGoal::Endurance,
        time_available_minutes: 78.0,
        weather: None,
        profile: &profile,
    };
    let candidates = vec![
        route("too-long", 70.0, 600.0, 0.9, TrainingGoal::Endurance),
        route("familiar", 30.0, 900.0, 0.9, TrainingGoal::Endurance),
        route("short", 12.0, 50.0, 0.9, TrainingGoal::Endurance),
    ];
    let ranked = rank_routes(candidates, &ctx, &ScoringConfig::default());
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].route.name, "familiar");
    assert_eq!(ranked[2].route.name, "too-long");
}

#[test]
fn test_intervals_reward_low_headwind() {
    let profile = RidingPatternProfile::default_profile();
    let candidate = route("north", 20.0, 100.0, 0.9, TrainingGoal::Intervals);

    let calm = ScoringContext {
        goal: TrainingGoal::Intervals,
        time_available_minutes: 52.0,
        weather: Some(WeatherConditions::rated(1.0, 180.0, TrainingGoal::Intervals)),
        profile: &profile,
    };
    let windy = ScoringContext {
        weather: Some(WeatherConditions::rated(15.0, 0.0, TrainingGoal::Intervals)),
        ..calm
    };

    let config = ScoringConfig::default();
    assert_eq!(score_route(&candidate, &calm, &config).goal, 0.15);
    assert_eq!(score_route(&candidate, &windy, &config).goal, 0.0);
    assert!(
        wind_factor(&candidate.coordinates, windy.weather.as_ref(), 0.8)
            < wind_factor(&candidate.coordinates, calm.weather.as_ref(), 0.8)
    );
}

#[test]
fn test_max_routes_respected() {
    let profile = RidingPatternProfile::default_profile();
    let ctx = ScoringContext {
        goal: TrainingGoal::General,
        time_available_minutes: 60.0,
        weather: None,
        profile: &profile,
    };
    let candidates: Vec<RouteCandidate> = (0..7)
        .map(|i| route(&format!("r{}", i), 10.0 + i as f64 * 3.0, 0.0, 0.9, TrainingGoal::General))
        .collect();
    let config = ScoringConfig {
        max_routes: 2,
        ..ScoringConfig::default()
    };
    assert_eq!(rank_routes(candidates, &ctx, &config).len(), 2);
}
