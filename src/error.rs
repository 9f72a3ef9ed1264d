//! Unified error handling for the ride-planner library.
//!
//! Mining never fails: sparse input is skipped and empty input falls back to the
//! default profile. Errors only surface from collaborator calls, and the planner
//! catches those per candidate and degrades to fallback geometry.

use thiserror::Error;

/// Unified error type for ride-planner operations.
#[derive(Debug, Clone, Error)]
pub enum PlannerError {
    /// A ride or polyline has too few points for the requested operation
    #[error("Ride '{ride_id}' has {point_count} points, minimum {minimum_required} required")]
    InsufficientPoints {
        ride_id: String,
        point_count: usize,
        minimum_required: usize,
    },

    /// A coordinate is outside the valid WGS84 range
    #[error("Invalid coordinates in {context}: {message}")]
    InvalidCoordinates { context: String, message: String },

    /// A collaborator returned an unusable response
    #[error("Provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// HTTP/API error
    #[error("HTTP error{}: {message}", .status_code.map(|c| format!(" ({})", c)).unwrap_or_default())]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    /// A collaborator call exceeded its deadline
    #[error("Provider '{provider}' timed out after {after_ms}ms")]
    Timeout { provider: String, after_ms: u64 },

    /// Map matching succeeded but is not trustworthy enough to use
    #[error("Match confidence {confidence:.2} below minimum {minimum:.2}")]
    LowConfidence { confidence: f64, minimum: f64 },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for ride-planner operations.
pub type Result<T> = std::result::Result<T, PlannerError>;

/// Extension trait for converting Option to PlannerError.
pub trait OptionExt<T> {
    /// Convert Option to Result with insufficient points error.
    fn ok_or_insufficient_points(
        self,
        ride_id: &str,
        point_count: usize,
        minimum: usize,
    ) -> Result<T>;

    /// Convert Option to Result with a provider error.
    fn ok_or_provider(self, provider: &str, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_points(
        self,
        ride_id: &str,
        point_count: usize,
        minimum: usize,
    ) -> Result<T> {
        self.ok_or_else(|| PlannerError::InsufficientPoints {
            ride_id: ride_id.to_string(),
            point_count,
            minimum_required: minimum,
        })
    }

    fn ok_or_provider(self, provider: &str, message: &str) -> Result<T> {
        self.ok_or_else(|| PlannerError::Provider {
            provider: provider.to_string(),
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlannerError::InsufficientPoints {
            ride_id: "ride-1".to_string(),
            point_count: 4,
            minimum_required: 10,
        };
        assert!(err.to_string().contains("ride-1"));
        assert!(err.to_string().contains("4 points"));
    }

    #[test]
    fn test_http_error_display() {
        let with_code = PlannerError::Http {
            message: "bad gateway".to_string(),
            status_code: Some(502),
        };
        assert_eq!(with_code.to_string(), "HTTP error (502): bad gateway");

        let without_code = PlannerError::Http {
            message: "connection reset".to_string(),
            status_code: None,
        };
        assert_eq!(without_code.to_string(), "HTTP error: connection reset");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_insufficient_points("test", 0, 2);
        assert!(matches!(
            result,
            Err(PlannerError::InsufficientPoints { .. })
        ));

        let none: Option<i32> = None;
        let result = none.ok_or_provider("mapbox", "no routes");
        assert!(matches!(result, Err(PlannerError::Provider { .. })));
    }
}
