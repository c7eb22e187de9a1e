//! Configuration types for the approach clustering pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::loaders::ProgressWindow;
use crate::core::transforms::NanFilter;

/// Which flights to keep from the raw table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// ICAO code matched against the `Destination` column
    #[serde(default = "default_airport_code")]
    pub airport_code: String,

    /// Lower (exclusive) bound on `DRemains`
    #[serde(default = "default_min_remaining")]
    pub min_remaining: f64,

    /// Upper (exclusive) bound on `DRemains`
    #[serde(default = "default_max_remaining")]
    pub max_remaining: f64,
}

fn default_airport_code() -> String {
    "WSSS".to_string()
}

fn default_min_remaining() -> f64 {
    0.01
}

fn default_max_remaining() -> f64 {
    1.0
}

impl FilterConfig {
    /// `DRemains` window selected by this filter.
    pub fn window(&self) -> ProgressWindow {
        ProgressWindow {
            min: self.min_remaining,
            max: self.max_remaining,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            airport_code: default_airport_code(),
            min_remaining: default_min_remaining(),
            max_remaining: default_max_remaining(),
        }
    }
}

/// Limits applied while building per-flight coordinate sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Maximum number of flights kept for the distance matrix
    #[serde(default = "default_max_flights")]
    pub max_flights: usize,

    /// Keep only the first N samples of each flight
    #[serde(default)]
    pub max_samples: Option<usize>,
}

fn default_max_flights() -> usize {
    1000
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            max_flights: default_max_flights(),
            max_samples: None,
        }
    }
}

/// Distance between two individual trajectory samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointMetric {
    /// Great-circle distance in kilometres
    #[default]
    Haversine,
    /// Euclidean distance in degree space
    Euclidean,
}

/// Distance assigned to any pair that involves a trajectory with no samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyTrajectoryPolicy {
    /// Largest finite distance observed between non-empty trajectories
    #[default]
    MaxObserved,
    /// Positive infinity; such flights never have neighbors
    Infinite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistanceConfig {
    #[serde(default)]
    pub point_metric: PointMetric,

    #[serde(default)]
    pub empty_policy: EmptyTrajectoryPolicy,
}

/// Predicate evaluated on the number of distinct labels after each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum StopCondition {
    /// Stop when exactly this many distinct labels appear
    Exact(usize),
    /// Stop once at most this many distinct labels appear
    AtMost(usize),
    /// Run every threshold in the range
    Never,
}

impl StopCondition {
    pub fn is_met(&self, distinct_labels: usize) -> bool {
        match *self {
            StopCondition::Exact(n) => distinct_labels == n,
            StopCondition::AtMost(n) => distinct_labels <= n,
            StopCondition::Never => false,
        }
    }
}

impl Default for StopCondition {
    fn default() -> Self {
        StopCondition::Exact(2)
    }
}

/// Configuration for the radius sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Step size as a fraction of the reference row's distance spread
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// First threshold, in steps
    #[serde(default = "default_start_multiple")]
    pub start_multiple: u32,

    /// Last threshold bound, in steps
    #[serde(default = "default_end_multiple")]
    pub end_multiple: u32,

    /// Include `end_multiple * step` itself
    #[serde(default)]
    pub inclusive_end: bool,

    /// Minimum neighborhood size (self included) for a core flight
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Distance-matrix row the range is derived from
    #[serde(default)]
    pub reference_row: usize,

    #[serde(default)]
    pub stop: StopCondition,
}

fn default_alpha() -> f64 {
    0.01
}

fn default_start_multiple() -> u32 {
    2
}

fn default_end_multiple() -> u32 {
    5
}

fn default_min_samples() -> usize {
    2
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            start_multiple: default_start_multiple(),
            end_multiple: default_end_multiple(),
            inclusive_end: false,
            min_samples: default_min_samples(),
            reference_row: 0,
            stop: StopCondition::default(),
        }
    }
}

/// Configuration for rendered images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Directory every PNG is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Bins per axis in the density heat-map
    #[serde(default = "default_density_gridsize")]
    pub density_gridsize: usize,

    #[serde(default = "default_density_size")]
    pub density_width: u32,

    #[serde(default = "default_density_size")]
    pub density_height: u32,

    #[serde(default = "default_scatter_width")]
    pub scatter_width: u32,

    #[serde(default = "default_scatter_height")]
    pub scatter_height: u32,

    /// Alpha/transparency of scatter points (0.0 to 1.0)
    #[serde(default = "default_point_alpha")]
    pub point_alpha: f64,

    #[serde(default)]
    pub nan_filter: NanFilter,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_density_gridsize() -> usize {
    500
}

fn default_density_size() -> u32 {
    2000
}

fn default_scatter_width() -> u32 {
    2000
}

fn default_scatter_height() -> u32 {
    1000
}

fn default_point_alpha() -> f64 {
    0.8
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            density_gridsize: default_density_gridsize(),
            density_width: default_density_size(),
            density_height: default_density_size(),
            scatter_width: default_scatter_width(),
            scatter_height: default_scatter_height(),
            point_alpha: default_point_alpha(),
            nan_filter: NanFilter::default(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub encoding: EncodingConfig,

    #[serde(default)]
    pub distance: DistanceConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub plot: PlotConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
