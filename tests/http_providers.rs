//! Tests for the HTTP collaborators against mock servers

use std::sync::Arc;

use mockito::{Matcher, Server};
use ride_planner::http::DIRECTIONS_CONFIDENCE;
use ride_planner::*;

const DIRECTIONS: &str = r"^/directions/v5/mapbox/cycling/";
const MATCHING: &str = r"^/matching/v5/mapbox/cycling/";

fn waypoints() -> Vec<GpsPoint> {
    vec![
        GpsPoint::new(46.95, 7.44),
        GpsPoint::new(46.97, 7.46),
        GpsPoint::new(46.95, 7.44),
    ]
}

fn directions_body() -> String {
    serde_json::json!({
        "code": "Ok",
        "routes": [{
            "geometry": {
                "type": "LineString",
                "coordinates": [[7.44, 46.95], [7.45, 46.96], [7.46, 46.97], [7.44, 46.95]]
            },
            "distance": 6120.5,
            "duration": 1100.0,
            "weight": 1200.0
        }]
    })
    .to_string()
}

fn matching_body(confidence: f64) -> String {
    serde_json::json!({
        "code": "Ok",
        "matchings": [{
            "geometry": {
                "type": "LineString",
                "coordinates": [[7.44, 46.95], [7.46, 46.97]]
            },
            "distance": 3050.0,
            "duration": 600.0,
            "confidence": confidence
        }],
        "tracepoints": []
    })
    .to_string()
}

#[tokio::test]
async fn test_directions_success() {
    let mut server = Server::new_async().await;
    let directions = server
        .mock("GET", Matcher::Regex(DIRECTIONS.to_string()))
        .match_query(Matcher::UrlEncoded("access_token".into(), "token-123".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(directions_body())
        .create_async()
        .await;
    let matching = server
        .mock("GET", Matcher::Regex(MATCHING.to_string()))
        .expect(0)
        .create_async()
        .await;

    let matcher = MapboxMatcher::new("token-123").unwrap().with_base_url(&server.url());
    let route = matcher.match_route(&waypoints(), "cycling").await.unwrap();

    assert_eq!(route.coordinates.len(), 4);
    assert_eq!(route.coordinates[1], GpsPoint::new(46.96, 7.45));
    assert_eq!(route.distance_m, 6120.5);
    assert_eq!(route.confidence, DIRECTIONS_CONFIDENCE);

    directions.assert_async().await;
    matching.assert_async().await;
}

#[tokio::test]
async fn test_directions_failure_falls_back_to_matching() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(DIRECTIONS.to_string()))
        .with_status(500)
        .with_body("upstream error")
        .create_async()
        .await;
    let matching = server
        .mock("GET", Matcher::Regex(MATCHING.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(matching_body(0.73))
        .create_async()
        .await;

    let matcher = MapboxMatcher::new("t").unwrap().with_base_url(&server.url());
    let route = matcher.match_route(&waypoints(), "cycling").await.unwrap();

    assert_eq!(route.confidence, 0.73);
    assert_eq!(route.distance_m, 3050.0);
    matching.assert_async().await;
}

#[tokio::test]
async fn test_no_route_code_falls_back_to_matching() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(DIRECTIONS.to_string()))
        .with_status(200)
        .with_body(r#"{"code":"NoRoute","routes":[]}"#)
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Regex(MATCHING.to_string()))
        .with_status(200)
        .with_body(matching_body(0.4))
        .create_async()
        .await;

    let matcher = MapboxMatcher::new("t").unwrap().with_base_url(&server.url());
    let route = matcher.match_route(&waypoints(), "cycling").await.unwrap();
    assert_eq!(route.confidence, 0.4);
}

#[tokio::test]
async fn test_both_endpoints_failing_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(DIRECTIONS.to_string()))
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Regex(MATCHING.to_string()))
        .with_status(401)
        .with_body("Not Authorized - Invalid Token")
        .create_async()
        .await;

    let matcher = MapboxMatcher::new("bad").unwrap().with_base_url(&server.url());
    let err = matcher.match_route(&waypoints(), "cycling").await.unwrap_err();
    match err {
        PlannerError::Http { status_code, .. } => assert_eq!(status_code, Some(401)),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_single_waypoint_rejected_without_request() {
    let matcher = MapboxMatcher::new("t").unwrap().with_base_url("http://127.0.0.1:9");
    let err = matcher
        .match_route(&[GpsPoint::new(46.95, 7.44)], "cycling")
        .await
        .unwrap_err();
    assert!(matches!(err, PlannerError::InsufficientPoints { .. }));
}

#[tokio::test]
async fn test_elevation_lookup() {
    let mut server = Server::new_async().await;
    let lookup = server
        .mock("POST", "/api/v1/lookup")
        .match_body(Matcher::Json(serde_json::json!({
            "locations": [
                {"latitude": 46.95, "longitude": 7.44},
                {"latitude": 46.97, "longitude": 7.46},
                {"latitude": 46.95, "longitude": 7.44}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "results": [
                    {"latitude": 46.95, "longitude": 7.44, "elevation": 540.0},
                    {"latitude": 46.97, "longitude": 7.46, "elevation": 610.0},
                    {"latitude": 46.95, "longitude": 7.44, "elevation": 540.0}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = OpenElevationClient::new().unwrap().with_base_url(&server.url());
    let samples = client.sample(&waypoints()).await.unwrap();

    assert_eq!(samples.len(), 3);
    assert_eq!(samples[1].elevation_m, 610.0);
    assert_eq!(samples[1].coordinate, GpsPoint::new(46.97, 7.46));
    assert_eq!(generator::elevation_gain_loss(&samples), (70.0, 70.0));
    lookup.assert_async().await;
}

#[tokio::test]
async fn test_elevation_empty_polyline_skips_request() {
    let client = OpenElevationClient::new().unwrap().with_base_url("http://127.0.0.1:9");
    assert!(client.sample(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_weather_conditions_rated_for_goal() {
    let mut server = Server::new_async().await;
    let weather = server
        .mock("GET", "/data/2.5/weather")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("appid".into(), "owm-key".into()),
            Matcher::UrlEncoded("units".into(), "metric".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"wind":{"speed":4.0,"deg":270},"main":{"temp":18.2}}"#)
        .create_async()
        .await;

    let client = OpenWeatherClient::new("owm-key").unwrap().with_base_url(&server.url());
    let conditions = client
        .conditions(GpsPoint::new(46.95, 7.44), TrainingGoal::Recovery)
        .await
        .unwrap();

    assert_eq!(conditions.wind_speed, 4.0);
    assert_eq!(conditions.wind_degrees, 270.0);
    assert_eq!(conditions.goal_score, 0.5);
    weather.assert_async().await;
}

#[tokio::test]
async fn test_planner_over_http_collaborators() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(DIRECTIONS.to_string()))
        .with_status(200)
        .with_body(directions_body())
        .expect_at_least(1)
        .create_async()
        .await;
    server
        .mock("POST", "/api/v1/lookup")
        .with_status(503)
        .create_async()
        .await;
    server
        .mock("GET", "/data/2.5/weather")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"wind":{"speed":2.0,"deg":90}}"#)
        .create_async()
        .await;

    let url = server.url();
    let planner = RoutePlanner::new(
        Arc::new(InMemoryRideStore::new()),
        Arc::new(MapboxMatcher::new("t").unwrap().with_base_url(&url)),
        Arc::new(OpenElevationClient::new().unwrap().with_base_url(&url)),
    )
    .with_weather(Arc::new(OpenWeatherClient::new("k").unwrap().with_base_url(&url)))
    .with_generator_config(GeneratorConfig {
        seed: Some(1),
        ..GeneratorConfig::default()
    })
    .unwrap();

    let request = RouteRequest::new(GpsPoint::new(46.95, 7.44), 20.0, TrainingGoal::General, RouteShape::Loop);
    let routes = planner.generate_routes("rider", &request).await;

    assert_eq!(routes.len(), 4);
    for r in &routes {
        assert_eq!(r.route.source, CandidateSource::Synthesized);
        assert_eq!(r.route.confidence, DIRECTIONS_CONFIDENCE);
        // Elevation service down: no climbing, not a failure
        assert_eq!(r.route.elevation_gain_m, 0.0);
        assert!(r.breakdown.weather > 0.0);
    }
}
