//! Output locations for rendered artifacts.
//!
//! Every image the pipeline produces lands under a single output directory:
//! - `traffic_density_<run id>.png` for the density heat-map
//! - `cluster_<cluster count>.png` for each sweep step

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while preparing output locations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create a directory.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates `dir` and all of its parents if they don't exist.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| WriteError::CreateDirectory {
        path: dir.display().to_string(),
        source: e,
    })
}

/// Creates parent directories for a file path if they don't exist.
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Filesystem-safe UTC timestamp, e.g. `2024-03-01_12-30-05`.
pub fn timestamp_id(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Path of the density heat-map for a run.
pub fn density_plot_path(dir: &Path, run_id: &str) -> PathBuf {
    dir.join(format!("traffic_density_{}.png", run_id))
}

/// Path of the scatter plot for a sweep step that produced `cluster_count`
/// distinct labels.
pub fn cluster_plot_path(dir: &Path, cluster_count: usize) -> PathBuf {
    dir.join(format!("cluster_{}.png", cluster_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        // Second call is a no-op.
        ensure_dir(&nested).unwrap();
    }

    #[test]
    fn test_ensure_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plots").join("cluster_2.png");

        ensure_parent_dirs(&path).unwrap();
        assert!(dir.path().join("plots").is_dir());
        assert!(!path.exists());
    }

    #[test]
    fn test_ensure_dir_fails_on_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();

        let err = ensure_dir(&file.join("child")).unwrap_err();
        assert!(matches!(err, WriteError::CreateDirectory { .. }));
    }

    #[test]
    fn test_plot_paths() {
        let dir = Path::new("tmp");
        assert_eq!(cluster_plot_path(dir, 2), PathBuf::from("tmp/cluster_2.png"));
        assert_eq!(
            density_plot_path(dir, "run"),
            PathBuf::from("tmp/traffic_density_run.png")
        );
    }

    #[test]
    fn test_timestamp_id() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(timestamp_id(at), "2024-03-01_12-30-05");
    }
}
