//! Visualization tools for flight traffic and clustering results.
//!
//! Two PNG renderers built on plotters' bitmap backend:
//! a log-scaled density heat-map of raw positions, and a scatter plot of
//! every trajectory sample colored by the cluster label of its flight.
//! Neither draws text, so no font backend is required.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::PlotConfig;
use crate::core::transforms::{filter_nan_pairs, finite_extent};
use crate::core::writers::{ensure_parent_dirs, WriteError};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Empty point cloud")]
    EmptyPointCloud,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

fn plotting_error<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Color palette for cluster visualization.
const CLUSTER_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),   // Red
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (255, 255, 51),  // Yellow
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (153, 153, 153), // Gray
    (0, 206, 209),   // Turquoise
    (138, 43, 226),  // Blue Violet
    (50, 205, 50),   // Lime Green
    (255, 20, 147),  // Deep Pink
    (0, 191, 255),   // Deep Sky Blue
    (255, 215, 0),   // Gold
];

/// Noise color (gray) for unclustered flights (label = -1).
const NOISE_COLOR: (u8, u8, u8) = (128, 128, 128);

/// Control points of the inferno colormap, evenly spaced over [0, 1].
const INFERNO_STOPS: &[(u8, u8, u8)] = &[
    (0, 0, 4),
    (40, 11, 84),
    (101, 21, 110),
    (159, 42, 99),
    (212, 72, 66),
    (245, 125, 21),
    (250, 193, 39),
    (252, 255, 164),
];

/// Palette color for a cluster label. Negative labels are noise.
pub fn label_color(label: i32) -> RGBColor {
    let (r, g, b) = if label < 0 {
        NOISE_COLOR
    } else {
        CLUSTER_COLORS[label as usize % CLUSTER_COLORS.len()]
    };
    RGBColor(r, g, b)
}

/// Inferno-like gradient; `t` is clamped to [0, 1].
pub fn inferno(t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let segments = (INFERNO_STOPS.len() - 1) as f64;
    let pos = t * segments;
    let i = (pos.floor() as usize).min(INFERNO_STOPS.len() - 2);
    let frac = pos - i as f64;

    let (r0, g0, b0) = INFERNO_STOPS[i];
    let (r1, g1, b1) = INFERNO_STOPS[i + 1];
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    RGBColor(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
}

/// Square histogram of (latitude, longitude) pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    pub gridsize: usize,
    pub lat_range: (f64, f64),
    pub lon_range: (f64, f64),
    /// Row-major counts, `counts[lat_bin * gridsize + lon_bin]`
    pub counts: Vec<u32>,
}

impl DensityGrid {
    /// Bin finite pairs over their own extent. `None` if no pair is finite
    /// or `gridsize` is zero.
    pub fn from_pairs(lat: &[f64], lon: &[f64], gridsize: usize) -> Option<Self> {
        if gridsize == 0 {
            return None;
        }
        let lat_range = widen(finite_extent(lat)?);
        let lon_range = widen(finite_extent(lon)?);

        let mut counts = vec![0u32; gridsize * gridsize];
        for (&la, &lo) in lat.iter().zip(lon) {
            if !(la.is_finite() && lo.is_finite()) {
                continue;
            }
            let i = bin_index(la, lat_range, gridsize);
            let j = bin_index(lo, lon_range, gridsize);
            counts[i * gridsize + j] += 1;
        }

        Some(Self {
            gridsize,
            lat_range,
            lon_range,
            counts,
        })
    }

    #[inline]
    pub fn count(&self, lat_bin: usize, lon_bin: usize) -> u32 {
        self.counts[lat_bin * self.gridsize + lon_bin]
    }

    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Lower-left and upper-right corners of a bin in data coordinates.
    fn cell(&self, lat_bin: usize, lon_bin: usize) -> [(f64, f64); 2] {
        let g = self.gridsize as f64;
        let dx = (self.lat_range.1 - self.lat_range.0) / g;
        let dy = (self.lon_range.1 - self.lon_range.0) / g;
        let x0 = self.lat_range.0 + lat_bin as f64 * dx;
        let y0 = self.lon_range.0 + lon_bin as f64 * dy;
        [(x0, y0), (x0 + dx, y0 + dy)]
    }
}

/// Give a zero-width extent some room so every value lands in a bin.
fn widen((lo, hi): (f64, f64)) -> (f64, f64) {
    if (hi - lo).abs() < f64::EPSILON {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}

fn bin_index(value: f64, (lo, hi): (f64, f64), gridsize: usize) -> usize {
    let t = (value - lo) / (hi - lo);
    ((t * gridsize as f64).floor().max(0.0) as usize).min(gridsize - 1)
}

/// Render the traffic density heat-map of raw positions.
///
/// Latitude runs along x and longitude along y. Empty cells stay white and
/// occupied cells are colored by `log10(count)` relative to the busiest cell.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `lat` - Latitude column, may contain NaN
/// * `lon` - Longitude column, may contain NaN
/// * `config` - Grid size, image size and NaN handling
pub fn plot_density(output_path: &Path, lat: &[f64], lon: &[f64], config: &PlotConfig) -> Result<DensityGrid> {
    let (lat, lon) = filter_nan_pairs(lat, lon, config.nan_filter);
    let grid = DensityGrid::from_pairs(&lat, &lon, config.density_gridsize)
        .ok_or(VisualizationError::EmptyPointCloud)?;

    ensure_parent_dirs(output_path)?;

    let root = BitMapBackend::new(output_path, (config.density_width, config.density_height))
        .into_drawing_area();
    root.fill(&WHITE).map_err(plotting_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(0)
        .build_cartesian_2d(grid.lat_range.0..grid.lat_range.1, grid.lon_range.0..grid.lon_range.1)
        .map_err(plotting_error)?;

    let max_log = f64::from(grid.max_count()).log10();
    let g = grid.gridsize;
    let cells = (0..g).flat_map(|i| (0..g).map(move |j| (i, j))).filter_map(|(i, j)| {
        let count = grid.count(i, j);
        if count == 0 {
            return None;
        }
        let t = if max_log > 0.0 {
            f64::from(count).log10() / max_log
        } else {
            1.0
        };
        Some(Rectangle::new(grid.cell(i, j), inferno(t).filled()))
    });

    chart.draw_series(cells).map_err(plotting_error)?;
    root.present().map_err(plotting_error)?;

    Ok(grid)
}

/// Samples of one flight and the label they are drawn with.
#[derive(Debug, Clone, Copy)]
pub struct LabeledTrajectory<'a> {
    pub points: &'a [[f64; 2]],
    pub label: i32,
}

/// Scatter every sample of every trajectory, colored by its flight's label.
///
/// Points are `[latitude, longitude]`; latitude runs along x. Non-finite
/// samples are skipped since they have no position on the canvas.
pub fn plot_cluster_scatter(
    output_path: &Path,
    trajectories: &[LabeledTrajectory<'_>],
    width: u32,
    height: u32,
    alpha: f64,
) -> Result<()> {
    let points: Vec<(f64, f64, RGBAColor)> = trajectories
        .iter()
        .flat_map(|t| {
            let color = label_color(t.label).mix(alpha.clamp(0.0, 1.0));
            t.points
                .iter()
                .filter(|p| p[0].is_finite() && p[1].is_finite())
                .map(move |p| (p[0], p[1], color))
        })
        .collect();

    if points.is_empty() {
        return Err(VisualizationError::EmptyPointCloud);
    }

    let (x_min, x_max, y_min, y_max) = compute_bounds(&points);
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    ensure_parent_dirs(output_path)?;

    let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(plotting_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(plotting_error)?;

    chart
        .draw_series(points.iter().map(|(x, y, color)| Circle::new((*x, *y), 3, color.filled())))
        .map_err(plotting_error)?;

    root.present().map_err(plotting_error)?;

    Ok(())
}

/// Compute the bounds (min/max) for x and y coordinates.
fn compute_bounds(points: &[(f64, f64, RGBAColor)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for (x, y, _) in points {
        x_min = x_min.min(*x);
        x_max = x_max.max(*x);
        y_min = y_min.min(*y);
        y_max = y_max.max(*y);
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transforms::NanFilter;
    use tempfile::tempdir;

    fn small_plot_config() -> PlotConfig {
        PlotConfig {
            density_gridsize: 10,
            density_width: 100,
            density_height: 100,
            ..PlotConfig::default()
        }
    }

    #[test]
    fn test_label_color_palette() {
        assert_eq!(label_color(-1), RGBColor(128, 128, 128));
        assert_eq!(label_color(0), RGBColor(228, 26, 28));
        // Palette wraps after 15 labels
        assert_eq!(label_color(15), label_color(0));
        assert_eq!(label_color(16), label_color(1));
    }

    #[test]
    fn test_inferno_endpoints() {
        assert_eq!(inferno(0.0), RGBColor(0, 0, 4));
        assert_eq!(inferno(1.0), RGBColor(252, 255, 164));
        assert_eq!(inferno(2.0), inferno(1.0));
        assert_eq!(inferno(f64::NAN), inferno(0.0));
    }

    #[test]
    fn test_density_grid_counts() {
        let lat = [0.0, 0.0, 10.0, 5.0];
        let lon = [0.0, 0.0, 10.0, 5.0];
        let grid = DensityGrid::from_pairs(&lat, &lon, 10).unwrap();

        assert_eq!(grid.total(), 4);
        assert_eq!(grid.count(0, 0), 2);
        // Max values land in the last bin
        assert_eq!(grid.count(9, 9), 1);
        assert_eq!(grid.count(5, 5), 1);
        assert_eq!(grid.max_count(), 2);
    }

    #[test]
    fn test_density_grid_single_point() {
        let grid = DensityGrid::from_pairs(&[1.5], &[103.9], 4).unwrap();
        assert_eq!(grid.total(), 1);
        assert!(grid.lat_range.0 < 1.5 && grid.lat_range.1 > 1.5);
    }

    #[test]
    fn test_density_grid_rejects_empty() {
        assert!(DensityGrid::from_pairs(&[], &[], 10).is_none());
        assert!(DensityGrid::from_pairs(&[f64::NAN], &[1.0], 10).is_none());
        assert!(DensityGrid::from_pairs(&[1.0], &[1.0], 0).is_none());
    }

    #[test]
    fn test_plot_density_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("traffic_density_test.png");

        let lat = [1.0, f64::NAN, 2.0, 1.5, 1.2];
        let lon = [103.0, 104.0, f64::NAN, 103.5, 103.2];
        let grid = plot_density(&path, &lat, &lon, &small_plot_config()).unwrap();

        assert!(path.exists());
        // Joint filtering keeps three pairs
        assert_eq!(grid.total(), 3);
    }

    #[test]
    fn test_plot_density_per_axis_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("density.png");
        let config = PlotConfig {
            nan_filter: NanFilter::PerAxis,
            ..small_plot_config()
        };

        let lat = [1.0, f64::NAN, 2.0];
        let lon = [3.0, 4.0, f64::NAN];
        let grid = plot_density(&path, &lat, &lon, &config).unwrap();

        // [1, 2] paired with [3, 4]
        assert_eq!(grid.total(), 2);
    }

    #[test]
    fn test_plot_density_all_nan_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("density.png");
        let err = plot_density(&path, &[f64::NAN], &[f64::NAN], &small_plot_config()).unwrap_err();
        assert!(matches!(err, VisualizationError::EmptyPointCloud));
        assert!(!path.exists());
    }

    #[test]
    fn test_plot_cluster_scatter_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("cluster_2.png");

        let a = [[1.0, 103.0], [1.1, 103.1]];
        let b = [[1.4, 103.9]];
        let trajectories = [
            LabeledTrajectory { points: &a, label: 0 },
            LabeledTrajectory { points: &b, label: -1 },
        ];

        plot_cluster_scatter(&path, &trajectories, 200, 100, 0.8).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_plot_cluster_scatter_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cluster_1.png");
        let trajectories = [LabeledTrajectory { points: &[], label: 0 }];

        let err = plot_cluster_scatter(&path, &trajectories, 200, 100, 0.8).unwrap_err();
        assert!(matches!(err, VisualizationError::EmptyPointCloud));
    }
}
