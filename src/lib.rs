//! Trajectory clustering of flights approaching an airport.
//!
//! This crate provides tools for:
//! - Loading flight position CSVs and selecting the final approach segment
//! - Rendering a log-scaled traffic density heat-map
//! - Building a symmetric Hausdorff distance matrix between trajectories
//! - Sweeping the DBSCAN radius until the flights split into two groups
//!
//! # Example
//!
//! ```no_run
//! use approach_clustering::{core::loaders::load_flight_csv, processors::pipeline::run_pipeline};
//! use approach_clustering::{PipelineConfig, RunContext};
//!
//! let table = load_flight_csv("flights.csv").unwrap();
//! let config = PipelineConfig::default();
//! let ctx = RunContext::new(&config.plot.output_dir);
//! let report = run_pipeline(&table, &config, &ctx).unwrap();
//! println!("{:?}", report.flight_groups);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{
    DistanceConfig, EncodingConfig, FilterConfig, PipelineConfig, PlotConfig, StopCondition, SweepConfig,
};
pub use crate::core::context::RunContext;
pub use crate::core::loaders::{FlightPoint, FlightTable};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
