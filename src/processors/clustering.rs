//! Density-based clustering over a precomputed distance matrix.
//!
//! The sweep only depends on the [`ClusteringAlgorithm`] trait, so other
//! strategies (hierarchical, OPTICS) can be dropped in without touching it.
//! [`Dbscan`] is the default implementation.
//!
//! # Example
//!
//! ```
//! use approach_clustering::processors::clustering::{ClusteringAlgorithm, Dbscan};
//! use approach_clustering::processors::distance::DistanceMatrix;
//!
//! let matrix = DistanceMatrix::from_rows(vec![
//!     vec![0.0, 0.1, 9.0],
//!     vec![0.1, 0.0, 9.0],
//!     vec![9.0, 9.0, 0.0],
//! ])
//! .unwrap();
//! let labeling = Dbscan::new(2).fit(&matrix, 0.5).unwrap();
//! assert_eq!(labeling.labels(), &[0, 0, -1]);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use thiserror::Error;

use crate::processors::distance::DistanceMatrix;

/// Label reserved for points outside every dense cluster.
pub const NOISE: i32 = -1;

/// Errors raised by clustering algorithms.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClusteringError {
    #[error("neighborhood radius must be finite and non-negative, got {0}")]
    InvalidRadius(f64),

    #[error("min_samples must be at least 1")]
    InvalidMinSamples,
}

/// Result type for clustering operations.
pub type Result<T> = std::result::Result<T, ClusteringError>;

/// A clustering strategy that labels every row of a distance matrix.
///
/// Implementations must be deterministic for identical inputs and use
/// [`NOISE`] for unclustered rows. Label numbering carries no meaning across
/// calls with different parameters.
pub trait ClusteringAlgorithm {
    fn name(&self) -> &'static str;

    /// Label every row of `distances` using neighborhood radius `radius`.
    fn fit(&self, distances: &DistanceMatrix, radius: f64) -> Result<ClusterLabeling>;
}

/// One cluster label per distance-matrix row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterLabeling {
    labels: Vec<i32>,
}

impl ClusterLabeling {
    pub fn new(labels: Vec<i32>) -> Self {
        Self { labels }
    }

    #[inline]
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Distinct labels, noise included.
    pub fn distinct_labels(&self) -> BTreeSet<i32> {
        self.labels.iter().copied().collect()
    }

    /// Number of distinct labels, noise counted as its own group.
    pub fn cluster_count(&self) -> usize {
        self.distinct_labels().len()
    }

    /// Number of rows labelled [`NOISE`].
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == NOISE).count()
    }

    /// Row indices per label, in ascending row order.
    pub fn members(&self) -> BTreeMap<i32, Vec<usize>> {
        let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (row, &label) in self.labels.iter().enumerate() {
            groups.entry(label).or_default().push(row);
        }
        groups
    }

    /// Distance-matrix rows grouped by label.
    pub fn row_groups<'a>(&self, distances: &'a DistanceMatrix) -> BTreeMap<i32, Vec<&'a [f64]>> {
        self.members()
            .into_iter()
            .map(|(label, rows)| (label, rows.into_iter().map(|r| distances.row(r)).collect()))
            .collect()
    }
}

/// Sequential union-find with path halving.
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    /// Create a new union-find structure where each element is its own parent.
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            let gp = self.parent[self.parent[x]];
            self.parent[x] = gp;
            x = gp;
        }
        x
    }

    /// Union the sets containing `x` and `y`. The smaller root always points
    /// at the larger one. Returns false if they were already joined.
    pub fn union(&mut self, x: usize, y: usize) -> bool {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x == root_y {
            return false;
        }
        let (small, large) = if root_x < root_y {
            (root_x, root_y)
        } else {
            (root_y, root_x)
        };
        self.parent[small] = large;
        true
    }
}

/// DBSCAN over precomputed distances.
///
/// Row `j` is a neighbor of row `i` when `d(i, j) <= radius`; every row is
/// its own neighbor. A row is a core row when it has at least `min_samples`
/// neighbors. Core rows that are neighbors share a cluster, non-core rows
/// join the lowest-numbered cluster among their core neighbors, and
/// everything else is [`NOISE`]. Cluster ids are numbered in order of each
/// cluster's lowest-index core row.
#[derive(Debug, Clone, Copy)]
pub struct Dbscan {
    pub min_samples: usize,
}

impl Dbscan {
    pub fn new(min_samples: usize) -> Self {
        Self { min_samples }
    }
}

impl ClusteringAlgorithm for Dbscan {
    fn name(&self) -> &'static str {
        "dbscan"
    }

    fn fit(&self, distances: &DistanceMatrix, radius: f64) -> Result<ClusterLabeling> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(ClusteringError::InvalidRadius(radius));
        }
        if self.min_samples == 0 {
            return Err(ClusteringError::InvalidMinSamples);
        }

        let n = distances.size();
        if n == 0 {
            return Ok(ClusterLabeling::new(Vec::new()));
        }

        // Phase 1: neighborhoods, ascending by index. NaN never compares <=.
        let neighbors: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                distances
                    .row(i)
                    .iter()
                    .enumerate()
                    .filter(|&(j, &d)| j == i || d <= radius)
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        // Phase 2: core rows
        let is_core: Vec<bool> = neighbors
            .iter()
            .map(|neigh| neigh.len() >= self.min_samples)
            .collect();

        // Phase 3: connect core rows through core neighbors
        let mut uf = UnionFind::new(n);
        for i in 0..n {
            if is_core[i] {
                for &j in &neighbors[i] {
                    if j > i && is_core[j] {
                        uf.union(i, j);
                    }
                }
            }
        }

        // Phase 4: number clusters by their first core row
        let mut root_to_cluster: HashMap<usize, i32> = HashMap::new();
        let mut next_cluster_id: i32 = 0;
        for i in 0..n {
            if is_core[i] {
                let root = uf.find(i);
                root_to_cluster.entry(root).or_insert_with(|| {
                    let id = next_cluster_id;
                    next_cluster_id += 1;
                    id
                });
            }
        }

        // Phase 5: labels for core, border and noise rows. A border row takes
        // the smallest cluster id among its core neighbors, which is the
        // cluster whose expansion reaches it first.
        let mut labels = vec![NOISE; n];
        for i in 0..n {
            if is_core[i] {
                labels[i] = root_to_cluster[&uf.find(i)];
                continue;
            }
            let mut best: Option<i32> = None;
            for &j in &neighbors[i] {
                if is_core[j] {
                    let id = root_to_cluster[&uf.find(j)];
                    best = Some(best.map_or(id, |b| b.min(id)));
                }
            }
            if let Some(id) = best {
                labels[i] = id;
            }
        }

        Ok(ClusterLabeling::new(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: Vec<Vec<f64>>) -> DistanceMatrix {
        DistanceMatrix::from_rows(rows).unwrap()
    }

    /// Two tight pairs far apart plus one isolated row.
    fn two_pairs_and_outlier() -> DistanceMatrix {
        matrix(vec![
            vec![0.0, 0.1, 5.0, 5.0, 9.0],
            vec![0.1, 0.0, 5.0, 5.0, 9.0],
            vec![5.0, 5.0, 0.0, 0.2, 9.0],
            vec![5.0, 5.0, 0.2, 0.0, 9.0],
            vec![9.0, 9.0, 9.0, 9.0, 0.0],
        ])
    }

    #[test]
    fn test_union_find_basic() {
        let mut uf = UnionFind::new(5);

        assert_eq!(uf.find(0), 0);
        assert_eq!(uf.find(4), 4);

        assert!(uf.union(0, 1));
        assert_eq!(uf.find(0), uf.find(1));

        assert!(uf.union(2, 3));
        assert_ne!(uf.find(0), uf.find(2));

        assert!(uf.union(1, 2));
        assert_eq!(uf.find(0), uf.find(3));

        assert!(!uf.union(0, 3));
    }

    #[test]
    fn test_dbscan_two_clusters_and_noise() {
        let labeling = Dbscan::new(2).fit(&two_pairs_and_outlier(), 0.5).unwrap();
        assert_eq!(labeling.labels(), &[0, 0, 1, 1, NOISE]);
        assert_eq!(labeling.cluster_count(), 3);
        assert_eq!(labeling.noise_count(), 1);
    }

    #[test]
    fn test_dbscan_radius_is_inclusive() {
        let labeling = Dbscan::new(2).fit(&two_pairs_and_outlier(), 0.1).unwrap();
        assert_eq!(labeling.labels(), &[0, 0, NOISE, NOISE, NOISE]);
    }

    #[test]
    fn test_dbscan_large_radius_merges_everything() {
        let labeling = Dbscan::new(2).fit(&two_pairs_and_outlier(), 10.0).unwrap();
        assert_eq!(labeling.labels(), &[0; 5]);
        assert_eq!(labeling.cluster_count(), 1);
    }

    #[test]
    fn test_dbscan_border_rows() {
        // Chain 0 - 1 - 2 with min_samples 3: only row 1 is core.
        let m = matrix(vec![
            vec![0.0, 1.0, 2.0],
            vec![1.0, 0.0, 1.0],
            vec![2.0, 1.0, 0.0],
        ]);
        let labeling = Dbscan::new(3).fit(&m, 1.0).unwrap();
        assert_eq!(labeling.labels(), &[0, 0, 0]);

        let labeling = Dbscan::new(4).fit(&m, 1.0).unwrap();
        assert_eq!(labeling.labels(), &[NOISE, NOISE, NOISE]);
    }

    #[test]
    fn test_border_row_joins_lowest_cluster_id() {
        // Clusters {0, 5, 6, 7} (id 0) and {1, 2, 3, 4} (id 1). Row 8 touches
        // row 1 and row 5 only; its lowest-index core neighbor is in cluster 1.
        let groups = [0, 1, 1, 1, 1, 0, 0, 0];
        let rows = (0..9)
            .map(|i| {
                (0..9)
                    .map(|j| {
                        if i == j {
                            0.0
                        } else if i < 8 && j < 8 && groups[i] == groups[j] {
                            1.0
                        } else if (i == 8 && (j == 1 || j == 5)) || (j == 8 && (i == 1 || i == 5)) {
                            1.0
                        } else {
                            10.0
                        }
                    })
                    .collect()
            })
            .collect();
        let m = matrix(rows);

        let labeling = Dbscan::new(4).fit(&m, 1.0).unwrap();
        assert_eq!(labeling.labels(), &[0, 1, 1, 1, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_dbscan_single_row_is_noise() {
        let m = matrix(vec![vec![0.0]]);
        let labeling = Dbscan::new(2).fit(&m, 1.0).unwrap();
        assert_eq!(labeling.labels(), &[NOISE]);
        assert_eq!(labeling.cluster_count(), 1);
    }

    #[test]
    fn test_dbscan_min_samples_one() {
        let labeling = Dbscan::new(1).fit(&two_pairs_and_outlier(), 0.5).unwrap();
        assert_eq!(labeling.labels(), &[0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_dbscan_infinite_distances_never_connect() {
        let m = matrix(vec![
            vec![0.0, f64::INFINITY],
            vec![f64::INFINITY, 0.0],
        ]);
        let labeling = Dbscan::new(2).fit(&m, 1e300).unwrap();
        assert_eq!(labeling.labels(), &[NOISE, NOISE]);
    }

    #[test]
    fn test_dbscan_invalid_parameters() {
        let m = two_pairs_and_outlier();
        assert_eq!(
            Dbscan::new(2).fit(&m, -1.0).unwrap_err(),
            ClusteringError::InvalidRadius(-1.0)
        );
        assert!(Dbscan::new(2).fit(&m, f64::NAN).is_err());
        assert_eq!(
            Dbscan::new(0).fit(&m, 1.0).unwrap_err(),
            ClusteringError::InvalidMinSamples
        );
    }

    #[test]
    fn test_dbscan_empty_matrix() {
        let labeling = Dbscan::new(2).fit(&DistanceMatrix::zeros(0), 1.0).unwrap();
        assert!(labeling.is_empty());
    }

    #[test]
    fn test_dbscan_is_deterministic() {
        let m = two_pairs_and_outlier();
        let a = Dbscan::new(2).fit(&m, 0.5).unwrap();
        let b = Dbscan::new(2).fit(&m, 0.5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_members_and_row_groups() {
        let m = two_pairs_and_outlier();
        let labeling = Dbscan::new(2).fit(&m, 0.5).unwrap();

        let members = labeling.members();
        assert_eq!(members[&0], vec![0, 1]);
        assert_eq!(members[&NOISE], vec![4]);

        let groups = labeling.row_groups(&m);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&1][0], m.row(2));
        assert_eq!(groups[&NOISE][0][4], 0.0);
        assert_eq!(
            labeling.distinct_labels().into_iter().collect::<Vec<_>>(),
            vec![NOISE, 0, 1]
        );
    }
}
