//! Contracts for the external collaborators the planner talks to.
//!
//! All collaborators are treated as unreliable. The planner converts every error
//! they return into a degraded result (empty history, fallback geometry, zero
//! elevation, neutral weather) so a request never fails because of them.
//!
//! Implementations are shared as `Arc<dyn Trait>` and must be `Send + Sync`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::generator::TrainingGoal;
use crate::{GpsPoint, RideRecord};

/// Read-only access to a rider's ride history.
#[async_trait]
pub trait RideHistoryStore: Send + Sync {
    /// Up to `limit` rides for `user_id`. May return fewer.
    async fn fetch(&self, user_id: &str, limit: usize) -> Result<Vec<RideRecord>>;
}

/// A route snapped to the road network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRoute {
    pub coordinates: Vec<GpsPoint>,
    pub distance_m: f64,
    pub duration_s: f64,
    /// Match confidence in `[0, 1]`
    pub confidence: f64,
}

/// Snaps a waypoint sequence to a real-world path.
#[async_trait]
pub trait MapMatcher: Send + Sync {
    /// Match `waypoints` using a routing profile such as `"cycling"`.
    async fn match_route(&self, waypoints: &[GpsPoint], profile: &str) -> Result<MatchedRoute>;
}

/// One elevation sample along a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSample {
    pub coordinate: GpsPoint,
    pub elevation_m: f64,
}

/// Samples terrain elevation along a polyline.
#[async_trait]
pub trait ElevationProvider: Send + Sync {
    async fn sample(&self, polyline: &[GpsPoint]) -> Result<Vec<ElevationSample>>;
}

/// Current wind at a location, rated for a training goal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherConditions {
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Direction the wind blows from, degrees
    pub wind_degrees: f64,
    /// How suitable the conditions are for the goal, `[0, 1]`
    pub goal_score: f64,
}

impl WeatherConditions {
    /// Build conditions and rate them with [`rate_wind_for_goal`].
    pub fn rated(wind_speed: f64, wind_degrees: f64, goal: TrainingGoal) -> Self {
        Self {
            wind_speed,
            wind_degrees,
            goal_score: rate_wind_for_goal(wind_speed, goal),
        }
    }
}

/// Current conditions provider.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn conditions(&self, location: GpsPoint, goal: TrainingGoal) -> Result<WeatherConditions>;
}

/// Rate a wind speed (m/s) for a training goal, `[0, 1]`.
///
/// Recovery rides want calm air and fall off quickly with wind. Endurance and
/// hill rides tolerate moderate wind. Intervals are best in light wind and suffer
/// most from strong gusts.
pub fn rate_wind_for_goal(wind_speed: f64, goal: TrainingGoal) -> f64 {
    let speed = wind_speed.max(0.0);
    let score = match goal {
        TrainingGoal::Recovery => 1.0 - speed / 8.0,
        TrainingGoal::Endurance => 1.0 - (speed - 3.0).max(0.0) / 12.0,
        TrainingGoal::Hills => 1.0 - (speed - 4.0).max(0.0) / 14.0,
        TrainingGoal::Intervals => 1.0 - (speed - 2.0).max(0.0) / 8.0,
        TrainingGoal::General => 1.0 - speed / 15.0,
    };
    score.clamp(0.0, 1.0)
}

// =============================================================================
// In-memory ride store
// =============================================================================

/// Ride history held in memory, keyed by user id.
///
/// `fetch` returns the newest rides first.
#[derive(Debug, Default)]
pub struct InMemoryRideStore {
    rides: RwLock<HashMap<String, Vec<RideRecord>>>,
}

impl InMemoryRideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one user's rides.
    pub fn with_rides(user_id: &str, rides: Vec<RideRecord>) -> Self {
        let mut map = HashMap::new();
        map.insert(user_id.to_string(), rides);
        Self {
            rides: RwLock::new(map),
        }
    }

    pub async fn insert(&self, user_id: &str, ride: RideRecord) {
        self.rides
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(ride);
    }

    pub async fn ride_count(&self, user_id: &str) -> usize {
        self.rides.read().await.get(user_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl RideHistoryStore for InMemoryRideStore {
    async fn fetch(&self, user_id: &str, limit: usize) -> Result<Vec<RideRecord>> {
        let guard = self.rides.read().await;
        let mut rides = guard.get(user_id).cloned().unwrap_or_default();
        rides.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        rides.truncate(limit);
        Ok(rides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RideSummary;

    fn ride(id: &str, recorded_at: i64) -> RideRecord {
        RideRecord {
            id: id.to_string(),
            track_points: vec![],
            summary: RideSummary::default(),
            recorded_at,
        }
    }

    #[tokio::test]
    async fn test_store_returns_newest_first_with_limit() {
        let store = InMemoryRideStore::new();
        store.insert("alice", ride("old", 1)).await;
        store.insert("alice", ride("new", 3)).await;
        store.insert("alice", ride("mid", 2)).await;
        store.insert("bob", ride("other", 5)).await;

        let rides = store.fetch("alice", 2).await.unwrap();
        let ids: Vec<&str> = rides.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
        assert_eq!(store.ride_count("alice").await, 3);
    }

    #[tokio::test]
    async fn test_unknown_user_is_empty() {
        let store = InMemoryRideStore::with_rides("alice", vec![ride("a", 1)]);
        assert!(store.fetch("carol", 10).await.unwrap().is_empty());
    }

    #[test]
    fn test_wind_rating_bounds() {
        for goal in TrainingGoal::ALL {
            assert_eq!(rate_wind_for_goal(0.0, goal), 1.0);
            assert_eq!(rate_wind_for_goal(40.0, goal), 0.0);
        }
        assert!(rate_wind_for_goal(5.0, TrainingGoal::Recovery) < rate_wind_for_goal(5.0, TrainingGoal::Endurance));
    }
}
