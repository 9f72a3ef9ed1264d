//! Request orchestration: history → profile → candidates → ranking.
//!
//! [`RoutePlanner::generate_routes`] is the only entry point that performs I/O.
//! It never fails: collaborator problems degrade individual candidates, and an
//! unusable request yields an empty list.

use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use crate::error::{PlannerError, Result};
use crate::generator::{
    adjusted_target_distance, plan_candidates, realize_candidates, with_deadline,
    GeneratorConfig, RouteRequest,
};
use crate::patterns::{analyze_riding_patterns_with_config, PatternConfig, RidingPatternProfile};
use crate::providers::{
    ElevationProvider, MapMatcher, RideHistoryStore, WeatherConditions, WeatherProvider,
};
use crate::scoring::{rank_routes, ScoredRoute, ScoringConfig, ScoringContext};

/// Default number of historical rides fetched per request.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Generates ranked route suggestions for a rider.
#[derive(Clone)]
pub struct RoutePlanner {
    history: Arc<dyn RideHistoryStore>,
    matcher: Arc<dyn MapMatcher>,
    elevation: Arc<dyn ElevationProvider>,
    weather: Option<Arc<dyn WeatherProvider>>,
    pattern_config: PatternConfig,
    generator_config: GeneratorConfig,
    scoring_config: ScoringConfig,
    history_limit: usize,
}

impl RoutePlanner {
    pub fn new(
        history: Arc<dyn RideHistoryStore>,
        matcher: Arc<dyn MapMatcher>,
        elevation: Arc<dyn ElevationProvider>,
    ) -> Self {
        Self {
            history,
            matcher,
            elevation,
            weather: None,
            pattern_config: PatternConfig::default(),
            generator_config: GeneratorConfig::default(),
            scoring_config: ScoringConfig::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(weather);
        self
    }

    /// Replace the mining configuration. Fails on invalid thresholds.
    pub fn with_pattern_config(mut self, config: PatternConfig) -> Result<Self> {
        config.validate()?;
        self.pattern_config = config;
        Ok(self)
    }

    /// Replace the generator configuration. Fails on invalid ranges.
    pub fn with_generator_config(mut self, config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        self.generator_config = config;
        Ok(self)
    }

    pub fn with_scoring_config(mut self, config: ScoringConfig) -> Self {
        self.scoring_config = config;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn generator_config(&self) -> &GeneratorConfig {
        &self.generator_config
    }

    /// Fetch the rider's history and mine it. Store failures yield the default profile.
    pub async fn load_profile(&self, user_id: &str) -> RidingPatternProfile {
        let rides = match self.history.fetch(user_id, self.history_limit).await {
            Ok(rides) => rides,
            Err(e) => {
                warn!("[Planner] Ride history unavailable for {}: {}", user_id, e);
                Vec::new()
            }
        };
        analyze_riding_patterns_with_config(&rides, &self.pattern_config)
    }

    /// Generate up to `max_routes` ranked routes for `user_id`.
    pub async fn generate_routes(&self, user_id: &str, request: &RouteRequest) -> Vec<ScoredRoute> {
        let profile = self.load_profile(user_id).await;
        self.generate_routes_with_profile(&profile, request).await
    }

    /// Generate ranked routes from an already mined profile.
    pub async fn generate_routes_with_profile(
        &self,
        profile: &RidingPatternProfile,
        request: &RouteRequest,
    ) -> Vec<ScoredRoute> {
        let start = Instant::now();

        if !request.start.is_valid() {
            let err = PlannerError::InvalidCoordinates {
                context: "route request start".to_string(),
                message: format!("({}, {})", request.start.latitude, request.start.longitude),
            };
            warn!("[Planner] {}, no routes generated", err);
            return Vec::new();
        }

        let target_km = adjusted_target_distance(request, profile);
        if !(target_km.is_finite() && target_km > 0.0) {
            warn!("[Planner] Unusable target distance {} km, no routes generated", target_km);
            return Vec::new();
        }

        let plans = {
            let mut rng = self.generator_config.rng();
            plan_candidates(request, profile, target_km, &self.generator_config, &mut rng)
        };

        let (candidates, weather) = futures::join!(
            realize_candidates(
                plans,
                request,
                target_km,
                self.matcher.as_ref(),
                self.elevation.as_ref(),
                &self.generator_config,
            ),
            self.fetch_weather(request)
        );

        let ctx = ScoringContext {
            goal: request.goal,
            time_available_minutes: request.time_available_minutes,
            weather,
            profile,
        };
        let ranked = rank_routes(candidates, &ctx, &self.scoring_config);

        info!(
            "[Planner] {} routes for a {:.1} km {} request in {:?} (best score {:.2})",
            ranked.len(),
            target_km,
            request.goal.as_str(),
            start.elapsed(),
            ranked.first().map_or(0.0, |r| r.score)
        );
        ranked
    }

    async fn fetch_weather(&self, request: &RouteRequest) -> Option<WeatherConditions> {
        let provider = self.weather.as_ref()?;
        let call = provider.conditions(request.start, request.goal);
        match with_deadline("weather", self.generator_config.call_timeout(), call).await {
            Ok(conditions) => Some(conditions),
            Err(e) => {
                warn!("[Planner] Weather unavailable, scoring without it: {}", e);
                None
            }
        }
    }
}
