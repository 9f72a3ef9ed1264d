//! # Frequent Area Clustering
//!
//! Greedy, single-pass clustering of ride locations into frequently visited areas.
//!
//! ## Algorithm
//! 1. Walk the samples left to right
//! 2. Compare each sample to the running centroid (member mean) of every cluster
//! 3. Join the first cluster (lowest creation index) whose centroid lies within
//!    the tolerance, otherwise start a new cluster
//! 4. Keep clusters with at least `min_cluster_size` members, largest first
//!
//! Distances are planar Euclidean in degree space (see [`crate::geo_utils`]).
//!
//! ## Order Dependence
//! Centroids move as members join, so membership depends on input order: the same
//! set of samples in a different order can produce different clusters. This is
//! accepted behavior and is pinned by tests.
//!
//! ## Spatial Index
//! Centroids are kept in an R-tree so each sample only inspects nearby clusters.
//! Candidates are filtered by the same strict tolerance and the lowest cluster
//! index wins, which reproduces the linear first-match scan exactly.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::geo_utils::planar_distance_degrees;
use crate::GpsPoint;

/// Default clustering tolerance in degrees (~1.1 km).
pub const DEFAULT_CLUSTER_TOLERANCE_DEG: f64 = 0.01;

/// A frequently visited area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequentArea {
    /// Cluster centroid
    pub center: GpsPoint,
    /// Number of samples in the cluster
    pub frequency: u32,
    /// `min(frequency / 10, 1)`
    pub confidence: f64,
}

/// A raw cluster produced by [`cluster_locations`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocationCluster {
    pub center: GpsPoint,
    pub members: Vec<GpsPoint>,
}

// =============================================================================
// R-tree Indexed Centroid
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedCentroid {
    cluster: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedCentroid {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedCentroid {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

struct ClusterBuilder {
    sum_lat: f64,
    sum_lng: f64,
    members: Vec<GpsPoint>,
    centroid: IndexedCentroid,
}

impl ClusterBuilder {
    fn new(cluster: usize, first: GpsPoint) -> Self {
        Self {
            sum_lat: first.latitude,
            sum_lng: first.longitude,
            members: vec![first],
            centroid: IndexedCentroid {
                cluster,
                lat: first.latitude,
                lng: first.longitude,
            },
        }
    }

    fn add(&mut self, p: GpsPoint) {
        self.sum_lat += p.latitude;
        self.sum_lng += p.longitude;
        self.members.push(p);
        let n = self.members.len() as f64;
        self.centroid.lat = self.sum_lat / n;
        self.centroid.lng = self.sum_lng / n;
    }

    fn center(&self) -> GpsPoint {
        GpsPoint::new(self.centroid.lat, self.centroid.lng)
    }
}

// =============================================================================
// Clustering
// =============================================================================

/// Greedily cluster samples, returning every cluster in creation order.
///
/// A sample joins a cluster only when its planar distance to the cluster centroid
/// is strictly less than `tolerance_deg`.
pub fn cluster_locations(samples: &[GpsPoint], tolerance_deg: f64) -> Vec<LocationCluster> {
    let mut builders: Vec<ClusterBuilder> = Vec::new();
    let mut index: RTree<IndexedCentroid> = RTree::new();
    let tolerance_2 = tolerance_deg * tolerance_deg;

    for sample in samples.iter().filter(|p| p.is_valid()) {
        let query = [sample.latitude, sample.longitude];
        let first_match = index
            .locate_within_distance(query, tolerance_2)
            .filter(|c| {
                planar_distance_degrees(&GpsPoint::new(c.lat, c.lng), sample) < tolerance_deg
            })
            .map(|c| c.cluster)
            .min();

        match first_match {
            Some(cluster) => {
                let builder = &mut builders[cluster];
                index.remove(&builder.centroid);
                builder.add(*sample);
                index.insert(builder.centroid);
            }
            None => {
                let builder = ClusterBuilder::new(builders.len(), *sample);
                index.insert(builder.centroid);
                builders.push(builder);
            }
        }
    }

    builders
        .into_iter()
        .map(|b| LocationCluster {
            center: b.center(),
            members: b.members,
        })
        .collect()
}

/// Find the most frequently visited areas among ride samples.
///
/// Clusters smaller than `min_cluster_size` are discarded; the rest are sorted by
/// frequency (descending, creation order on ties) and capped at `max_areas`.
///
/// # Example
/// ```
/// use ride_planner::{find_frequent_areas, GpsPoint};
///
/// let samples: Vec<GpsPoint> = (0..4)
///     .map(|i| GpsPoint::new(46.95 + i as f64 * 0.001, 7.44))
///     .collect();
/// let areas = find_frequent_areas(&samples, 0.01, 3, 5);
/// assert_eq!(areas.len(), 1);
/// assert_eq!(areas[0].frequency, 4);
/// ```
pub fn find_frequent_areas(
    samples: &[GpsPoint],
    tolerance_deg: f64,
    min_cluster_size: usize,
    max_areas: usize,
) -> Vec<FrequentArea> {
    let mut areas: Vec<FrequentArea> = cluster_locations(samples, tolerance_deg)
        .into_iter()
        .filter(|c| c.members.len() >= min_cluster_size)
        .map(|c| {
            let frequency = c.members.len() as u32;
            FrequentArea {
                center: c.center,
                frequency,
                confidence: (frequency as f64 / 10.0).min(1.0),
            }
        })
        .collect();

    areas.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    areas.truncate(max_areas);
    areas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(lat: f64, lng: f64, n: usize) -> Vec<GpsPoint> {
        (0..n)
            .map(|i| GpsPoint::new(lat + i as f64 * 0.0005, lng + i as f64 * 0.0005))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_locations(&[], DEFAULT_CLUSTER_TOLERANCE_DEG).is_empty());
        assert!(find_frequent_areas(&[], DEFAULT_CLUSTER_TOLERANCE_DEG, 3, 5).is_empty());
    }

    #[test]
    fn test_separate_blobs_form_separate_clusters() {
        let mut samples = blob(46.0, 7.0, 4);
        samples.extend(blob(46.5, 7.5, 6));
        let clusters = cluster_locations(&samples, DEFAULT_CLUSTER_TOLERANCE_DEG);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members.len(), 4);
        assert_eq!(clusters[1].members.len(), 6);
    }

    #[test]
    fn test_small_clusters_dropped_and_sorted() {
        let mut samples = blob(46.0, 7.0, 3);
        samples.extend(blob(46.5, 7.5, 7));
        samples.extend(blob(47.0, 8.0, 2));
        let areas = find_frequent_areas(&samples, DEFAULT_CLUSTER_TOLERANCE_DEG, 3, 5);
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].frequency, 7);
        assert_eq!(areas[1].frequency, 3);
        assert!((areas[0].confidence - 0.7).abs() < 1e-12);
        assert!((areas[1].confidence - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_saturates() {
        let samples = blob(46.0, 7.0, 12);
        let areas = find_frequent_areas(&samples, 0.05, 3, 5);
        assert_eq!(areas[0].frequency, 12);
        assert_eq!(areas[0].confidence, 1.0);
    }

    #[test]
    fn test_output_capped_at_max_areas() {
        let mut samples = Vec::new();
        for k in 0..7 {
            samples.extend(blob(40.0 + k as f64, 7.0, 3 + k));
        }
        let areas = find_frequent_areas(&samples, DEFAULT_CLUSTER_TOLERANCE_DEG, 3, 5);
        assert_eq!(areas.len(), 5);
        let freqs: Vec<u32> = areas.iter().map(|a| a.frequency).collect();
        assert_eq!(freqs, vec![9, 8, 7, 6, 5]);
    }

    #[test]
    fn test_first_cluster_wins_when_two_are_in_range() {
        // Two seeds 0.012 apart, both within 0.01 of the midpoint sample
        let samples = vec![
            GpsPoint::new(46.000, 7.000),
            GpsPoint::new(46.012, 7.000),
            GpsPoint::new(46.006, 7.000),
        ];
        let clusters = cluster_locations(&samples, DEFAULT_CLUSTER_TOLERANCE_DEG);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members.len(), 2);
        assert_eq!(clusters[1].members.len(), 1);
    }

    #[test]
    fn test_membership_depends_on_input_order() {
        // A chain of points 0.006 apart: each is within tolerance of its neighbour
        // but not of points two steps away.
        let a = GpsPoint::new(46.000, 7.0);
        let b = GpsPoint::new(46.006, 7.0);
        let c = GpsPoint::new(46.012, 7.0);

        // a, b, c: b joins a (centroid 46.003); c is 0.009 from 46.003 -> joins
        let forward = cluster_locations(&[a, b, c], DEFAULT_CLUSTER_TOLERANCE_DEG);
        assert_eq!(forward.len(), 1);

        // a, c, b: c is 0.012 from a -> new cluster; b joins a (the first)
        let shuffled = cluster_locations(&[a, c, b], DEFAULT_CLUSTER_TOLERANCE_DEG);
        assert_eq!(shuffled.len(), 2);
        assert_eq!(shuffled[0].members, vec![a, b]);
        assert_eq!(shuffled[1].members, vec![c]);
    }

    #[test]
    fn test_centroid_is_member_mean() {
        let samples = vec![
            GpsPoint::new(46.000, 7.000),
            GpsPoint::new(46.002, 7.004),
            GpsPoint::new(46.004, 7.002),
        ];
        let clusters = cluster_locations(&samples, DEFAULT_CLUSTER_TOLERANCE_DEG);
        assert_eq!(clusters.len(), 1);
        assert!((clusters[0].center.latitude - 46.002).abs() < 1e-9);
        assert!((clusters[0].center.longitude - 7.002).abs() < 1e-9);
    }
}
