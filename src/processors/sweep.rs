//! Neighborhood-radius sweep.
//!
//! The candidate radii are derived from one row of the distance matrix:
//! `step = (max(row) - min(row)) * alpha`, and the sweep tries
//! `k * step` for `k` in `start_multiple..end_multiple` (the end is included
//! only with `inclusive_end`). Each radius gets a fresh labeling from the
//! clustering algorithm, and an observer is notified so it can render the
//! step. The sweep stops right after the first step whose distinct-label
//! count satisfies the configured [`StopCondition`](crate::config::StopCondition),
//! or after the last radius.
//!
//! A reference row without spread (a single flight, or identical flights)
//! yields a zero step. The sweep then clusters once at `max(row)` and reports
//! [`StopReason::DegenerateRange`] instead of failing: with one flight and
//! `min_samples = 2` the result is a single noise label and never converges.

use std::collections::BTreeSet;

use log::{info, warn};
use thiserror::Error;

use crate::config::SweepConfig;
use crate::core::context::RunContext;
use crate::core::transforms::finite_extent;
use crate::processors::clustering::{ClusterLabeling, ClusteringAlgorithm, ClusteringError};
use crate::processors::distance::DistanceMatrix;

/// Errors that end a sweep before any labeling is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SweepError {
    #[error("distance matrix is empty")]
    EmptyMatrix,

    #[error("reference row {row} is outside a {size}x{size} matrix")]
    ReferenceRowOutOfRange { row: usize, size: usize },

    #[error("no radius candidates between multiples: lower={lower}, upper={upper}, step={step}")]
    EmptyRange { lower: f64, upper: f64, step: f64 },

    #[error(transparent)]
    Clustering(#[from] ClusteringError),
}

/// Result type for sweep operations.
pub type Result<T> = std::result::Result<T, SweepError>;

/// Spread of the reference row and the resulting step size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusRange {
    pub lower: f64,
    pub upper: f64,
    pub step: f64,
}

impl RadiusRange {
    /// Range from explicit bounds.
    pub fn new(lower: f64, upper: f64, alpha: f64) -> Self {
        Self {
            lower,
            upper,
            step: (upper - lower) * alpha,
        }
    }

    /// Range over the finite entries of `row`. The diagonal zero of a
    /// distance-matrix row is part of it, so `lower` is usually 0.
    pub fn from_row(row: &[f64], alpha: f64) -> Option<Self> {
        finite_extent(row).map(|(lower, upper)| Self::new(lower, upper, alpha))
    }

    /// Candidate radii, strictly increasing. Empty when the step is not a
    /// positive finite number.
    pub fn thresholds(&self, config: &SweepConfig) -> Vec<f64> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Vec::new();
        }
        let end = if config.inclusive_end {
            config.end_multiple.saturating_add(1)
        } else {
            config.end_multiple
        };
        (config.start_multiple..end)
            .map(|k| f64::from(k) * self.step)
            .collect()
    }
}

/// Candidate radii for a reference row spread of `lower..upper`.
pub fn radius_candidates(lower: f64, upper: f64, config: &SweepConfig) -> Vec<f64> {
    RadiusRange::new(lower, upper, config.alpha).thresholds(config)
}

/// One completed sweep iteration, handed to the observer.
#[derive(Debug, Clone, Copy)]
pub struct SweepStep<'a> {
    pub index: usize,
    pub radius: f64,
    pub labeling: &'a ClusterLabeling,
}

/// What the sweep remembers about each iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSummary {
    pub radius: f64,
    pub distinct_labels: BTreeSet<i32>,
    pub noise_count: usize,
}

impl StepSummary {
    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.distinct_labels.len()
    }
}

/// Error type observers may return; the sweep only logs it.
pub type ObserverError = Box<dyn std::error::Error>;

/// Receives every labeling as soon as it is computed.
pub trait SweepObserver {
    fn on_step(&mut self, ctx: &RunContext, step: &SweepStep<'_>) -> std::result::Result<(), ObserverError>;
}

impl<F> SweepObserver for F
where
    F: FnMut(&RunContext, &SweepStep<'_>) -> std::result::Result<(), ObserverError>,
{
    fn on_step(&mut self, ctx: &RunContext, step: &SweepStep<'_>) -> std::result::Result<(), ObserverError> {
        self(ctx, step)
    }
}

/// Observer that does nothing.
pub struct NoopObserver;

impl SweepObserver for NoopObserver {
    fn on_step(&mut self, _ctx: &RunContext, _step: &SweepStep<'_>) -> std::result::Result<(), ObserverError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The stop condition held at the last step
    TargetReached,
    /// Every candidate radius was tried
    RangeExhausted,
    /// The reference row had no spread, so a single radius was tried
    DegenerateRange,
}

/// Result of a finished sweep.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub range: RadiusRange,
    pub steps: Vec<StepSummary>,
    /// Radius of the last step performed
    pub final_radius: f64,
    /// Labeling of the last step performed
    pub labeling: ClusterLabeling,
    pub stop_reason: StopReason,
    /// Steps whose observer returned an error
    pub observer_failures: usize,
}

impl SweepOutcome {
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::TargetReached
    }
}

/// Runs a [`ClusteringAlgorithm`] over the candidate radii of a matrix.
pub struct ClusteringSweep<'a> {
    config: &'a SweepConfig,
    algorithm: &'a dyn ClusteringAlgorithm,
}

impl<'a> ClusteringSweep<'a> {
    pub fn new(config: &'a SweepConfig, algorithm: &'a dyn ClusteringAlgorithm) -> Self {
        Self { config, algorithm }
    }

    /// Reference-row range of `distances`.
    pub fn range(&self, distances: &DistanceMatrix) -> Result<RadiusRange> {
        if distances.is_empty() {
            return Err(SweepError::EmptyMatrix);
        }
        let row = self.config.reference_row;
        if row >= distances.size() {
            return Err(SweepError::ReferenceRowOutOfRange {
                row,
                size: distances.size(),
            });
        }
        // A row always holds its finite diagonal zero.
        Ok(RadiusRange::from_row(distances.row(row), self.config.alpha)
            .unwrap_or_else(|| RadiusRange::new(0.0, 0.0, self.config.alpha)))
    }

    /// Run the sweep.
    ///
    /// Observer failures are logged and counted but never stop the sweep.
    ///
    /// # Errors
    ///
    /// Fails if the matrix is empty, the reference row is out of range, no
    /// candidate radius exists, or the algorithm rejects its parameters.
    pub fn run(
        &self,
        distances: &DistanceMatrix,
        ctx: &RunContext,
        observer: &mut dyn SweepObserver,
    ) -> Result<SweepOutcome> {
        let target = ctx.log_target();
        let range = self.range(distances)?;
        let degenerate = !(range.step.is_finite() && range.step > 0.0);
        let thresholds = if degenerate {
            warn!(
                target: target,
                "reference row has no usable spread (lower={:.6}, upper={:.6}); clustering once at radius {:.6}",
                range.lower,
                range.upper,
                range.upper
            );
            vec![range.upper]
        } else {
            range.thresholds(self.config)
        };
        if thresholds.is_empty() {
            return Err(SweepError::EmptyRange {
                lower: range.lower,
                upper: range.upper,
                step: range.step,
            });
        }

        info!(
            target: target,
            "{} sweep: lower={:.6} upper={:.6} step={:.6}, {} radii",
            self.algorithm.name(),
            range.lower,
            range.upper,
            range.step,
            thresholds.len()
        );

        let mut steps = Vec::with_capacity(thresholds.len());
        let mut observer_failures = 0usize;
        let mut last: Option<(f64, ClusterLabeling)> = None;
        let mut stop_reason = if degenerate {
            StopReason::DegenerateRange
        } else {
            StopReason::RangeExhausted
        };

        for (index, &radius) in thresholds.iter().enumerate() {
            let labeling = self.algorithm.fit(distances, radius)?;
            let distinct_labels = labeling.distinct_labels();

            info!(target: target, "radius {:.6}: labels {:?}", radius, labeling.labels());
            info!(
                target: target,
                "radius {:.6}: {} distinct labels {:?}, {} noise",
                radius,
                distinct_labels.len(),
                distinct_labels,
                labeling.noise_count()
            );

            let step = SweepStep {
                index,
                radius,
                labeling: &labeling,
            };
            if let Err(e) = observer.on_step(ctx, &step) {
                observer_failures += 1;
                warn!(target: target, "radius {:.6}: step observer failed: {}", radius, e);
            }

            let reached = self.config.stop.is_met(distinct_labels.len());
            steps.push(StepSummary {
                radius,
                noise_count: labeling.noise_count(),
                distinct_labels,
            });
            last = Some((radius, labeling));

            if reached {
                stop_reason = StopReason::TargetReached;
                break;
            }
        }

        // thresholds is non-empty, so at least one step ran
        let (final_radius, labeling) = last.ok_or(SweepError::EmptyRange {
            lower: range.lower,
            upper: range.upper,
            step: range.step,
        })?;

        match stop_reason {
            StopReason::TargetReached => info!(
                target: target,
                "sweep stopped at radius {:.6} with {} distinct labels",
                final_radius,
                labeling.cluster_count()
            ),
            StopReason::RangeExhausted | StopReason::DegenerateRange => warn!(
                target: target,
                "sweep exhausted {} radii without meeting {:?}; keeping radius {:.6}",
                steps.len(),
                self.config.stop,
                final_radius
            ),
        }

        Ok(SweepOutcome {
            range,
            steps,
            final_radius,
            labeling,
            stop_reason,
            observer_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StopCondition;
    use crate::processors::clustering::{Dbscan, NOISE};

    fn ctx() -> RunContext {
        RunContext::with_run_id("unused", "test")
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{:?} vs {:?}", actual, expected);
        }
    }

    /// Rows 0-2 nearly identical, rows 3 and 4 far from everything.
    fn three_close_two_far() -> DistanceMatrix {
        DistanceMatrix::from_rows(vec![
            vec![0.0, 0.001, 0.002, 60.0, 100.0],
            vec![0.001, 0.0, 0.001, 60.0, 100.0],
            vec![0.002, 0.001, 0.0, 60.0, 100.0],
            vec![60.0, 60.0, 60.0, 0.0, 45.0],
            vec![100.0, 100.0, 100.0, 45.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_radius_candidates_default() {
        let config = SweepConfig::default();
        let radii = radius_candidates(0.0, 10.0, &config);
        assert_close(&radii, &[0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_radius_candidates_inclusive_end() {
        let config = SweepConfig {
            inclusive_end: true,
            ..SweepConfig::default()
        };
        let radii = radius_candidates(0.0, 10.0, &config);
        assert_close(&radii, &[0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_radius_candidates_strictly_increasing() {
        let config = SweepConfig {
            start_multiple: 1,
            end_multiple: 50,
            ..SweepConfig::default()
        };
        let radii = radius_candidates(3.5, 1234.5, &config);
        assert_eq!(radii.len(), 49);
        assert!(radii.windows(2).all(|w| w[0] < w[1]));
        assert!(*radii.last().unwrap() < 50.0 * (1234.5 - 3.5) * 0.01);
    }

    #[test]
    fn test_radius_candidates_degenerate() {
        let config = SweepConfig::default();
        assert!(radius_candidates(4.0, 4.0, &config).is_empty());
        assert!(radius_candidates(0.0, f64::INFINITY, &config).is_empty());
    }

    #[test]
    fn test_range_ignores_infinite_entries() {
        let range = RadiusRange::from_row(&[0.0, 4.0, f64::INFINITY, 10.0], 0.01).unwrap();
        assert_eq!(range.lower, 0.0);
        assert_eq!(range.upper, 10.0);
    }

    #[test]
    fn test_sweep_stops_at_two_labels() {
        let matrix = three_close_two_far();
        let config = SweepConfig::default();
        let dbscan = Dbscan::new(config.min_samples);
        let sweep = ClusteringSweep::new(&config, &dbscan);

        let mut seen = Vec::new();
        let mut observer = |_: &RunContext, step: &SweepStep<'_>| -> std::result::Result<(), ObserverError> {
            seen.push((step.index, step.radius));
            Ok(())
        };
        let outcome = sweep.run(&matrix, &ctx(), &mut observer).unwrap();

        // step = 1.0, first radius 2.0 already separates the close trio.
        assert_eq!(outcome.stop_reason, StopReason::TargetReached);
        assert!(outcome.converged());
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(seen, vec![(0, 2.0)]);
        assert_eq!(outcome.final_radius, 2.0);
        assert_eq!(outcome.labeling.labels(), &[0, 0, 0, NOISE, NOISE]);
        assert_eq!(outcome.labeling.cluster_count(), 2);

        let members = outcome.labeling.members();
        assert!(members.values().any(|rows| rows.len() >= 3));
    }

    #[test]
    fn test_sweep_exhausts_range_and_keeps_last_labeling() {
        let matrix = three_close_two_far();
        let config = SweepConfig {
            stop: StopCondition::Exact(7),
            ..SweepConfig::default()
        };
        let dbscan = Dbscan::new(2);
        let outcome = ClusteringSweep::new(&config, &dbscan)
            .run(&matrix, &ctx(), &mut NoopObserver)
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::RangeExhausted);
        assert_eq!(outcome.steps.len(), 3);
        assert_eq!(outcome.final_radius, 4.0);
        assert_eq!(outcome.labeling.labels(), &[0, 0, 0, NOISE, NOISE]);
    }

    #[test]
    fn test_isolated_flights_never_converge() {
        // Every candidate radius leaves both flights as noise.
        let matrix = DistanceMatrix::from_rows(vec![
            vec![0.0, 300.0],
            vec![300.0, 0.0],
        ])
        .unwrap();
        let config = SweepConfig::default();
        let dbscan = Dbscan::new(2);
        let outcome = ClusteringSweep::new(&config, &dbscan)
            .run(&matrix, &ctx(), &mut NoopObserver)
            .unwrap();

        assert!(!outcome.converged());
        assert_eq!(outcome.labeling.labels(), &[NOISE, NOISE]);
        assert!(outcome.steps.iter().all(|s| s.cluster_count() == 1));
    }

    #[test]
    fn test_single_flight_is_degenerate_not_an_error() {
        let matrix = DistanceMatrix::zeros(1);
        let config = SweepConfig::default();
        let dbscan = Dbscan::new(2);
        let outcome = ClusteringSweep::new(&config, &dbscan)
            .run(&matrix, &ctx(), &mut NoopObserver)
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::DegenerateRange);
        assert!(!outcome.converged());
        assert_eq!(outcome.final_radius, 0.0);
        assert_eq!(outcome.labeling.labels(), &[NOISE]);
        assert_eq!(outcome.labeling.cluster_count(), 1);
    }

    #[test]
    fn test_identical_flights_form_one_cluster() {
        let matrix = DistanceMatrix::zeros(3);
        let config = SweepConfig::default();
        let dbscan = Dbscan::new(2);
        let outcome = ClusteringSweep::new(&config, &dbscan)
            .run(&matrix, &ctx(), &mut NoopObserver)
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::DegenerateRange);
        assert_eq!(outcome.labeling.labels(), &[0, 0, 0]);
    }

    #[test]
    fn test_empty_multiple_range_is_an_error() {
        let config = SweepConfig {
            start_multiple: 5,
            end_multiple: 5,
            ..SweepConfig::default()
        };
        let dbscan = Dbscan::new(2);
        let err = ClusteringSweep::new(&config, &dbscan)
            .run(&three_close_two_far(), &ctx(), &mut NoopObserver)
            .unwrap_err();
        assert!(matches!(err, SweepError::EmptyRange { .. }));
    }

    #[test]
    fn test_empty_matrix_and_bad_reference_row() {
        let config = SweepConfig::default();
        let dbscan = Dbscan::new(2);
        let sweep = ClusteringSweep::new(&config, &dbscan);
        assert_eq!(
            sweep.run(&DistanceMatrix::zeros(0), &ctx(), &mut NoopObserver).unwrap_err(),
            SweepError::EmptyMatrix
        );

        let config = SweepConfig {
            reference_row: 9,
            ..SweepConfig::default()
        };
        let sweep = ClusteringSweep::new(&config, &dbscan);
        assert_eq!(
            sweep.range(&three_close_two_far()).unwrap_err(),
            SweepError::ReferenceRowOutOfRange { row: 9, size: 5 }
        );
    }

    #[test]
    fn test_observer_failures_are_not_fatal() {
        let matrix = three_close_two_far();
        let config = SweepConfig {
            stop: StopCondition::Never,
            ..SweepConfig::default()
        };
        let dbscan = Dbscan::new(2);
        let mut observer = |_: &RunContext, _: &SweepStep<'_>| -> std::result::Result<(), ObserverError> {
            Err("disk full".into())
        };
        let outcome = ClusteringSweep::new(&config, &dbscan)
            .run(&matrix, &ctx(), &mut observer)
            .unwrap();

        assert_eq!(outcome.steps.len(), 3);
        assert_eq!(outcome.observer_failures, 3);
    }

    #[test]
    fn test_sweep_is_deterministic() {
        let matrix = three_close_two_far();
        let config = SweepConfig::default();
        let dbscan = Dbscan::new(2);
        let sweep = ClusteringSweep::new(&config, &dbscan);
        let a = sweep.run(&matrix, &ctx(), &mut NoopObserver).unwrap();
        let b = sweep.run(&matrix, &ctx(), &mut NoopObserver).unwrap();
        assert_eq!(a.labeling, b.labeling);
        assert_eq!(a.steps, b.steps);
    }
}
