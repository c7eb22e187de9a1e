//! Core data types and I/O operations.

pub mod context;
pub mod loaders;
pub mod transforms;
pub mod writers;

pub use context::RunContext;
pub use loaders::{load_flight_csv, FlightPoint, FlightTable, LoaderError, ProgressWindow};
pub use transforms::{filter_nan_pairs, haversine_km, NanFilter};
pub use writers::{cluster_plot_path, density_plot_path, ensure_dir, WriteError};
