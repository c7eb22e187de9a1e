//! Data processing modules.

pub mod clustering;
pub mod distance;
pub mod encoding;
pub mod pipeline;
pub mod sweep;

// Re-export key types for convenience
pub use clustering::{ClusterLabeling, ClusteringAlgorithm, ClusteringError, Dbscan, NOISE};
pub use distance::{build_distance_matrix, hausdorff, DistanceError, DistanceMatrix};
pub use encoding::{build_coordinate_dict, CoordinateDictionary, CoordinateSet, FlightEncoder};
pub use pipeline::{run_pipeline, select_flights, PipelineError, PipelineReport, RowGroupSummary};
pub use sweep::{
    radius_candidates, ClusteringSweep, RadiusRange, StopReason, SweepError, SweepObserver,
    SweepOutcome,
};
