//! Distance and elevation distributions over ride summaries.
//!
//! Both analyses fail soft: missing and non-positive values are filtered out,
//! and an empty sample set yields the documented default rather than an error.

use serde::{Deserialize, Serialize};

use crate::geo_utils::{mean, percentile};
use crate::RideRecord;

/// Fixed distance buckets used to find the rider's most common ride length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceRange {
    /// `[0, 15)` km
    Short,
    /// `[15, 35)` km
    Medium,
    /// `[35, 65)` km
    Long,
    /// `[65, 150)` km
    VeryLong,
}

impl DistanceRange {
    /// Buckets in tie-break order.
    pub const ALL: [DistanceRange; 4] = [
        DistanceRange::Short,
        DistanceRange::Medium,
        DistanceRange::Long,
        DistanceRange::VeryLong,
    ];

    /// Half-open `[min, max)` bounds in kilometers.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            DistanceRange::Short => (0.0, 15.0),
            DistanceRange::Medium => (15.0, 35.0),
            DistanceRange::Long => (35.0, 65.0),
            DistanceRange::VeryLong => (65.0, 150.0),
        }
    }

    pub fn contains(&self, km: f64) -> bool {
        let (min, max) = self.bounds();
        km >= min && km < max
    }
}

/// Qualitative climbing label derived from mean elevation gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationCategory {
    Flat,
    Rolling,
    Hilly,
    Mountainous,
}

impl ElevationCategory {
    pub fn from_mean_gain(mean_gain_m: f64) -> Self {
        if mean_gain_m < 200.0 {
            ElevationCategory::Flat
        } else if mean_gain_m < 500.0 {
            ElevationCategory::Rolling
        } else if mean_gain_m < 1000.0 {
            ElevationCategory::Hilly
        } else {
            ElevationCategory::Mountainous
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn has_spread(&self) -> bool {
        self.max > self.min
    }
}

/// Distribution of ride distances in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceDistribution {
    pub mean: f64,
    pub median: f64,
    pub percentiles: Percentiles,
    pub range: ValueRange,
    pub most_common_range: DistanceRange,
    /// Number of rides the distribution was computed from (0 for the default)
    pub sample_count: usize,
}

impl Default for DistanceDistribution {
    /// Profile used when there is no usable distance history.
    fn default() -> Self {
        Self {
            mean: 25.0,
            median: 25.0,
            percentiles: Percentiles {
                p25: 15.0,
                p50: 25.0,
                p75: 40.0,
                p90: 60.0,
            },
            range: ValueRange {
                min: 10.0,
                max: 80.0,
            },
            most_common_range: DistanceRange::Medium,
            sample_count: 0,
        }
    }
}

/// Climbing habits in meters of elevation gain per ride.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationTolerance {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// 60th percentile
    pub preferred: f64,
    /// 80th percentile
    pub tolerance: f64,
    pub category: ElevationCategory,
    pub sample_count: usize,
}

impl Default for ElevationTolerance {
    /// Profile used when there is no usable elevation history.
    fn default() -> Self {
        Self {
            min: 50.0,
            max: 800.0,
            mean: 300.0,
            preferred: 250.0,
            tolerance: 500.0,
            category: ElevationCategory::Rolling,
            sample_count: 0,
        }
    }
}

fn positive_sorted(values: impl Iterator<Item = Option<f64>>) -> Vec<f64> {
    let mut filtered: Vec<f64> = values
        .flatten()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    filtered.sort_by(f64::total_cmp);
    filtered
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Analyse ride distances.
///
/// # Example
/// ```
/// use ride_planner::{analyze_distance_distribution, DistanceRange, RideRecord, RideSummary};
///
/// let rides: Vec<RideRecord> = [12.0, 22.0, 30.0]
///     .iter()
///     .enumerate()
///     .map(|(i, km)| RideRecord {
///         id: format!("ride-{}", i),
///         track_points: vec![],
///         summary: RideSummary { distance_km: Some(*km), elevation_gain_m: None },
///         recorded_at: 0,
///     })
///     .collect();
///
/// let dist = analyze_distance_distribution(&rides);
/// assert_eq!(dist.mean, 64.0 / 3.0);
/// assert_eq!(dist.most_common_range, DistanceRange::Medium);
/// ```
pub fn analyze_distance_distribution(rides: &[RideRecord]) -> DistanceDistribution {
    let sorted = positive_sorted(rides.iter().map(|r| r.summary.distance_km));
    if sorted.is_empty() {
        return DistanceDistribution::default();
    }

    let p = |q: f64| percentile(&sorted, q).unwrap_or_default();

    // First bucket with the strictly highest count wins
    let mut most_common = DistanceRange::Short;
    let mut best_count = 0usize;
    for range in DistanceRange::ALL {
        let count = sorted.iter().filter(|d| range.contains(**d)).count();
        if count > best_count {
            best_count = count;
            most_common = range;
        }
    }

    DistanceDistribution {
        mean: mean(&sorted),
        median: median(&sorted),
        percentiles: Percentiles {
            p25: p(0.25),
            p50: p(0.5),
            p75: p(0.75),
            p90: p(0.9),
        },
        range: ValueRange {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        },
        most_common_range: most_common,
        sample_count: sorted.len(),
    }
}

/// Analyse elevation gain per ride.
pub fn analyze_elevation_tolerance(rides: &[RideRecord]) -> ElevationTolerance {
    let sorted = positive_sorted(rides.iter().map(|r| r.summary.elevation_gain_m));
    if sorted.is_empty() {
        return ElevationTolerance::default();
    }

    let avg = mean(&sorted);
    ElevationTolerance {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean: avg,
        preferred: percentile(&sorted, 0.6).unwrap_or(avg),
        tolerance: percentile(&sorted, 0.8).unwrap_or(avg),
        category: ElevationCategory::from_mean_gain(avg),
        sample_count: sorted.len(),
    }
}
