//! Plan rides for a rider with a small synthetic history.
//!
//! Uses offline collaborators: the "matcher" returns the waypoints unchanged and
//! terrain is a gentle sine wave.
//!
//! Run with: RUST_LOG=info cargo run --example plan_route

use std::sync::Arc;

use async_trait::async_trait;
use ride_planner::geo_utils::{destination_point, polyline_length};
use ride_planner::*;

struct StraightLines;

#[async_trait]
impl MapMatcher for StraightLines {
    async fn match_route(&self, waypoints: &[GpsPoint], _profile: &str) -> Result<MatchedRoute> {
        let distance_m = polyline_length(waypoints);
        Ok(MatchedRoute {
            coordinates: waypoints.to_vec(),
            distance_m,
            duration_s: distance_m / 6.5,
            confidence: 0.8,
        })
    }
}

struct RollingHills;

#[async_trait]
impl ElevationProvider for RollingHills {
    async fn sample(&self, polyline: &[GpsPoint]) -> Result<Vec<ElevationSample>> {
        Ok(polyline
            .iter()
            .map(|p| ElevationSample {
                coordinate: *p,
                elevation_m: 550.0 + 80.0 * (p.latitude * 200.0).sin(),
            })
            .collect())
    }
}

fn ride(id: &str, start: GpsPoint, legs: &[(f64, f64)], recorded_at: i64) -> RideRecord {
    let mut points = vec![TrackPoint::new(start.latitude, start.longitude)];
    let mut current = start;
    for (bearing, km) in legs {
        let steps = (km / 0.25).ceil() as usize;
        for _ in 0..steps {
            current = destination_point(&current, *bearing, km / steps as f64);
            points.push(TrackPoint::new(current.latitude, current.longitude));
        }
    }
    let distance: f64 = legs.iter().map(|(_, km)| km).sum();
    RideRecord {
        id: id.to_string(),
        track_points: points,
        summary: RideSummary {
            distance_km: Some(distance),
            elevation_gain_m: Some(distance * 14.0),
        },
        recorded_at,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let home = GpsPoint::new(46.9480, 7.4474); // Bern
    let rides = vec![
        ride("morning-loop", home, &[(0.0, 6.0), (90.0, 5.0), (180.0, 6.0), (270.0, 5.0)], 1_700_000_000_000),
        ride("lake-run", home, &[(200.0, 14.0), (20.0, 14.0)], 1_700_090_000_000),
        ride("morning-loop-2", home, &[(0.0, 6.0), (90.0, 5.0), (180.0, 6.0), (270.0, 5.0)], 1_700_180_000_000),
        ride("hill-repeats", home, &[(45.0, 9.0), (225.0, 9.0)], 1_700_270_000_000),
    ];

    let store = Arc::new(InMemoryRideStore::with_rides("demo-rider", rides));
    let planner = RoutePlanner::new(store, Arc::new(StraightLines), Arc::new(RollingHills))
        .with_generator_config(GeneratorConfig {
            seed: Some(7),
            ..GeneratorConfig::default()
        })?;

    let profile = planner.load_profile("demo-rider").await;
    println!("Profile from {} rides", profile.ride_count);
    println!(
        "  distances: mean {:.1} km, typical range {:?}",
        profile.preferred_distances.mean, profile.preferred_distances.most_common_range
    );
    println!("  elevation: {:?}", profile.elevation_tolerance.category);
    println!("  frequent areas: {}", profile.frequent_areas.len());
    for d in &profile.direction_preferences {
        println!("  direction {:?}: preference {:.2}", d.direction, d.preference);
    }
    println!("  known segments: {}", profile.route_segments.len());
    println!("  confidence: {:.2}\n", profile.overall_confidence());

    for (goal, shape) in [
        (TrainingGoal::Endurance, RouteShape::Loop),
        (TrainingGoal::Recovery, RouteShape::OutBack),
    ] {
        let request = RouteRequest::new(home, 75.0, goal, shape);
        let routes = planner.generate_routes_with_profile(&profile, &request).await;

        println!("{} {} ride, 75 minutes:", goal.as_str(), shape.as_str());
        for (i, r) in routes.iter().enumerate() {
            println!(
                "  {}. {:<16} {:>5.1} km {:>5.0} m  {:?}  score {:.2} ({:?})",
                i + 1,
                r.route.name,
                r.route.distance_km,
                r.route.elevation_gain_m,
                r.route.difficulty,
                r.score,
                r.route.source,
            );
        }
        println!();
    }

    Ok(())
}
