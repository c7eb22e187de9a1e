//! End-to-end run: select approaching flights, plot their density, encode
//! them, build the distance matrix and sweep the clustering radius.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{PipelineConfig, PlotConfig};
use crate::core::context::RunContext;
use crate::core::loaders::FlightTable;
use crate::core::writers::{cluster_plot_path, density_plot_path};
use crate::processors::clustering::{ClusterLabeling, Dbscan};
use crate::processors::distance::{build_distance_matrix_with_progress, DistanceMatrix};
use crate::processors::encoding::{build_coordinate_dict, CoordinateDictionary, FlightEncoder};
use crate::processors::sweep::{ClusteringSweep, ObserverError, SweepObserver, SweepOutcome, SweepStep};
use crate::visualization::{plot_cluster_scatter, plot_density, LabeledTrajectory};

/// Number of table rows echoed to the log before filtering.
const PREVIEW_ROWS: usize = 5;

/// Reasons a run has nothing to cluster.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("no rows approach {airport} inside the DRemains window")]
    EmptySelection { airport: String },

    #[error("no flights left to cluster")]
    NoFlights,
}

/// Summary of a finished clustering run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: String,
    pub rows_loaded: usize,
    pub rows_selected: usize,
    pub flights_selected: usize,
    /// Flights that entered the distance matrix
    pub flights_clustered: usize,
    /// Density heat-map, if it could be written
    pub density_plot: Option<PathBuf>,
    /// Scatter plots written during the sweep, in step order
    pub cluster_plots: Vec<PathBuf>,
    pub outcome: SweepOutcome,
    /// Flight IDs per final label, in matrix order
    pub flight_groups: BTreeMap<i32, Vec<String>>,
    /// Distance-matrix rows per final label
    pub row_groups: Vec<RowGroupSummary>,
}

/// Distance-matrix rows that share one final label.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroupSummary {
    pub label: i32,
    pub rows: usize,
    /// Mean of the finite entries across the group's rows
    pub mean_distance: f64,
}

/// Summarize [`ClusterLabeling::row_groups`], ordered by label.
pub fn summarize_row_groups(labeling: &ClusterLabeling, distances: &DistanceMatrix) -> Vec<RowGroupSummary> {
    labeling
        .row_groups(distances)
        .into_iter()
        .map(|(label, rows)| {
            let (sum, count) = rows
                .iter()
                .flat_map(|row| row.iter())
                .filter(|d| d.is_finite())
                .fold((0.0, 0usize), |(sum, count), d| (sum + d, count + 1));
            RowGroupSummary {
                label,
                rows: rows.len(),
                mean_distance: if count > 0 { sum / count as f64 } else { 0.0 },
            }
        })
        .collect()
}

/// Rows heading to the configured airport inside the `DRemains` window.
///
/// # Errors
///
/// [`PipelineError::EmptySelection`] when no row matches.
pub fn select_flights(table: &FlightTable, config: &PipelineConfig, ctx: &RunContext) -> Result<FlightTable> {
    let target = ctx.log_target();
    let filter = &config.filter;

    let selected = table.approaching(&filter.airport_code, filter.window());
    info!(
        target: target,
        "{} of {} rows approach {} with {} < DRemains < {}",
        selected.len(),
        table.len(),
        filter.airport_code,
        filter.min_remaining,
        filter.max_remaining
    );

    if selected.is_empty() {
        return Err(PipelineError::EmptySelection {
            airport: filter.airport_code.clone(),
        }
        .into());
    }
    Ok(selected)
}

/// Render the density heat-map of `selected` to `traffic_density_<run id>.png`.
pub fn render_density(selected: &FlightTable, plot: &PlotConfig, ctx: &RunContext) -> Result<PathBuf> {
    let path = density_plot_path(ctx.output_dir(), ctx.run_id());
    let (lat, lon) = selected.lat_lon_columns();
    let grid = plot_density(&path, &lat, &lon, plot)
        .with_context(|| format!("failed to render density plot {}", path.display()))?;

    info!(
        target: ctx.log_target(),
        "density plot {} ({} points, busiest cell {})",
        path.display(),
        grid.total(),
        grid.max_count()
    );
    Ok(path)
}

/// Writes one scatter plot per sweep step.
struct ScatterObserver<'a> {
    dictionary: &'a CoordinateDictionary,
    plot: &'a PlotConfig,
    written: Vec<PathBuf>,
}

impl SweepObserver for ScatterObserver<'_> {
    fn on_step(&mut self, ctx: &RunContext, step: &SweepStep<'_>) -> std::result::Result<(), ObserverError> {
        let path = cluster_plot_path(ctx.output_dir(), step.labeling.cluster_count());
        let trajectories: Vec<LabeledTrajectory<'_>> = self
            .dictionary
            .coords
            .iter()
            .zip(step.labeling.labels())
            .map(|(set, &label)| LabeledTrajectory {
                points: &set.points,
                label,
            })
            .collect();

        plot_cluster_scatter(
            &path,
            &trajectories,
            self.plot.scatter_width,
            self.plot.scatter_height,
            self.plot.point_alpha,
        )?;

        debug!(target: ctx.log_target(), "radius {:.6}: wrote {}", step.radius, path.display());
        self.written.push(path);
        Ok(())
    }
}

/// Run the whole clustering pipeline on a loaded table.
pub fn run_pipeline(table: &FlightTable, config: &PipelineConfig, ctx: &RunContext) -> Result<PipelineReport> {
    run_pipeline_with_progress(table, config, ctx, |_, _| {})
}

/// [`run_pipeline`], reporting `(rows done, total rows)` while the distance
/// matrix is built.
///
/// A density plot that cannot be written is only a warning, and so is every
/// scatter plot of the sweep.
pub fn run_pipeline_with_progress<F>(
    table: &FlightTable,
    config: &PipelineConfig,
    ctx: &RunContext,
    mut on_row: F,
) -> Result<PipelineReport>
where
    F: FnMut(usize, usize),
{
    let target = ctx.log_target();
    info!(target: target, "run {}: {} rows loaded", ctx.run_id(), table.len());

    for row in table.head(PREVIEW_ROWS) {
        info!(target: target, "{:?}", row);
    }
    info!(target: target, "origins: {:?}", table.origin_counts());
    info!(target: target, "destinations: {:?}", table.destination_counts());

    let selected = select_flights(table, config, ctx)?;

    let density_plot = match render_density(&selected, &config.plot, ctx) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(target: target, "{:#}", e);
            None
        }
    };

    let encoder = FlightEncoder::new(selected.flight_ids());
    info!(target: target, "{} flights approach {}", encoder.len(), config.filter.airport_code);
    for (index, id) in encoder.ids().iter().enumerate() {
        debug!(target: target, "flight {} -> {}", id, index);
    }

    let dictionary = build_coordinate_dict(
        &selected,
        &encoder,
        encoder.ids(),
        config.encoding.max_flights,
        config.encoding.max_samples,
    );
    if dictionary.is_empty() {
        return Err(PipelineError::NoFlights.into());
    }
    info!(
        target: target,
        "{} flights ({} samples) enter the distance matrix",
        dictionary.len(),
        dictionary.total_points()
    );

    let total = dictionary.len();
    let matrix = build_distance_matrix_with_progress(&dictionary.coords, &config.distance, |i| on_row(i + 1, total))
        .context("failed to build distance matrix")?;
    info!(
        target: target,
        "{}x{} distance matrix, largest entry {:?}",
        matrix.size(),
        matrix.size(),
        matrix.max_finite()
    );

    let dbscan = Dbscan::new(config.sweep.min_samples);
    let mut observer = ScatterObserver {
        dictionary: &dictionary,
        plot: &config.plot,
        written: Vec::new(),
    };
    let outcome = ClusteringSweep::new(&config.sweep, &dbscan)
        .run(&matrix, ctx, &mut observer)
        .context("clustering sweep failed")?;
    let cluster_plots = observer.written;

    let mut flight_groups: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    for (label, rows) in outcome.labeling.members() {
        let ids = rows
            .into_iter()
            .map(|row| dictionary.coords[row].flight_id.clone())
            .collect();
        flight_groups.insert(label, ids);
    }
    for (label, ids) in &flight_groups {
        info!(target: target, "label {}: {:?}", label, ids);
    }

    let row_groups = summarize_row_groups(&outcome.labeling, &matrix);
    for group in &row_groups {
        info!(
            target: target,
            "label {}: {} distance rows, mean distance {:.6}",
            group.label,
            group.rows,
            group.mean_distance
        );
    }

    Ok(PipelineReport {
        run_id: ctx.run_id().to_string(),
        rows_loaded: table.len(),
        rows_selected: selected.len(),
        flights_selected: encoder.len(),
        flights_clustered: dictionary.len(),
        density_plot,
        cluster_plots,
        outcome,
        flight_groups,
        row_groups,
    })
}
