//! Pairwise trajectory distance matrix.
//!
//! Each cell holds the symmetric Hausdorff distance between two flights:
//!
//! ```text
//! H(A, B) = max(h(A, B), h(B, A))
//! h(A, B) = max over a in A of (min over b in B of d(a, b))
//! ```
//!
//! where `d` is the configured [`PointMetric`]. Evaluation order is fixed
//! (pairs with `i < j` in row-major order, samples in trajectory order) and
//! every pair is computed once and mirrored, so two builds over the same
//! input produce bit-identical matrices.
//!
//! Trajectories without samples follow the [`EmptyTrajectoryPolicy`].

use thiserror::Error;

use crate::config::{DistanceConfig, EmptyTrajectoryPolicy, PointMetric};
use crate::core::transforms::{euclidean, haversine_km};
use crate::processors::encoding::CoordinateSet;

/// Errors raised while building a distance matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistanceError {
    #[error("flight {flight_id}: sample {sample} has a non-finite coordinate")]
    NonFiniteCoordinate { flight_id: String, sample: usize },
}

/// Result type for distance operations.
pub type Result<T> = std::result::Result<T, DistanceError>;

/// Symmetric square matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// All-zero `n x n` matrix.
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    /// Build from full rows. Returns `None` unless `rows` is square.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let n = rows.len();
        if rows.iter().any(|r| r.len() != n) {
            return None;
        }
        Some(Self {
            n,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Number of rows (and columns).
    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Writes `value` at `(i, j)` and `(j, i)`.
    #[inline]
    fn set_pair(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] = value;
        self.data[j * self.n + i] = value;
    }

    /// True when the diagonal is zero and `|d(i,j) - d(j,i)| <= tol`.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        (0..self.n).all(|i| {
            self.get(i, i) == 0.0
                && (i + 1..self.n).all(|j| {
                    let (a, b) = (self.get(i, j), self.get(j, i));
                    a == b || (a - b).abs() <= tol
                })
        })
    }

    /// Largest finite entry.
    pub fn max_finite(&self) -> Option<f64> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
    }
}

impl PointMetric {
    #[inline]
    pub fn distance(&self, a: [f64; 2], b: [f64; 2]) -> f64 {
        match self {
            PointMetric::Haversine => haversine_km(a, b),
            PointMetric::Euclidean => euclidean(a, b),
        }
    }
}

/// Directed Hausdorff distance `h(a, b)`. Both sets must be non-empty.
pub fn directed_hausdorff(a: &[[f64; 2]], b: &[[f64; 2]], metric: PointMetric) -> f64 {
    let mut worst = 0.0f64;
    for &p in a {
        let mut nearest = f64::INFINITY;
        for &q in b {
            let d = metric.distance(p, q);
            if d < nearest {
                nearest = d;
            }
        }
        if nearest > worst {
            worst = nearest;
        }
    }
    worst
}

/// Symmetric Hausdorff distance between two non-empty trajectories.
#[inline]
pub fn hausdorff(a: &[[f64; 2]], b: &[[f64; 2]], metric: PointMetric) -> f64 {
    let ab = directed_hausdorff(a, b, metric);
    let ba = directed_hausdorff(b, a, metric);
    if ba > ab {
        ba
    } else {
        ab
    }
}

/// Reject trajectories containing NaN or infinite coordinates.
pub fn validate_trajectories(trajectories: &[CoordinateSet]) -> Result<()> {
    for set in trajectories {
        if let Some(sample) = set
            .points
            .iter()
            .position(|p| !p[0].is_finite() || !p[1].is_finite())
        {
            return Err(DistanceError::NonFiniteCoordinate {
                flight_id: set.flight_id.clone(),
                sample,
            });
        }
    }
    Ok(())
}

/// Build the `N x N` distance matrix for `trajectories`.
///
/// `on_row` is called after each row `i` has been filled for all `j > i`,
/// which lets callers drive a progress display.
///
/// # Errors
///
/// Returns [`DistanceError::NonFiniteCoordinate`] before any distance is
/// computed if a trajectory contains a NaN or infinite coordinate.
pub fn build_distance_matrix_with_progress<F>(
    trajectories: &[CoordinateSet],
    config: &DistanceConfig,
    mut on_row: F,
) -> Result<DistanceMatrix>
where
    F: FnMut(usize),
{
    validate_trajectories(trajectories)?;

    let n = trajectories.len();
    let mut matrix = DistanceMatrix::zeros(n);
    let mut empty_pairs: Vec<(usize, usize)> = Vec::new();
    let mut max_observed: Option<f64> = None;

    for i in 0..n {
        let a = &trajectories[i].points;
        for j in (i + 1)..n {
            let b = &trajectories[j].points;
            if a.is_empty() || b.is_empty() {
                empty_pairs.push((i, j));
                continue;
            }
            let d = hausdorff(a, b, config.point_metric);
            max_observed = Some(max_observed.map_or(d, |m| if d > m { d } else { m }));
            matrix.set_pair(i, j, d);
        }
        on_row(i);
    }

    if !empty_pairs.is_empty() {
        let fill = match config.empty_policy {
            EmptyTrajectoryPolicy::MaxObserved => max_observed.unwrap_or(0.0),
            EmptyTrajectoryPolicy::Infinite => f64::INFINITY,
        };
        for (i, j) in empty_pairs {
            matrix.set_pair(i, j, fill);
        }
    }

    Ok(matrix)
}

/// Build the `N x N` distance matrix for `trajectories`.
pub fn build_distance_matrix(
    trajectories: &[CoordinateSet],
    config: &DistanceConfig,
) -> Result<DistanceMatrix> {
    build_distance_matrix_with_progress(trajectories, config, |_| {})
}
