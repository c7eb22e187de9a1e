//! Per-run context handed to every run-scoped component.

use std::path::{Path, PathBuf};

use chrono::Utc;

use super::writers::timestamp_id;

/// Log target used when none is given.
pub const DEFAULT_LOG_TARGET: &str = "approach_clustering::run";

/// Identity and output location of one pipeline run.
///
/// Components log through [`RunContext::log_target`] instead of a
/// module-level handle, so everything a run emits can be filtered by target.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: String,
    log_target: String,
    output_dir: PathBuf,
}

impl RunContext {
    /// New context whose run id is the current UTC time.
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self::with_run_id(output_dir, timestamp_id(Utc::now()))
    }

    pub fn with_run_id<P: Into<PathBuf>, S: Into<String>>(output_dir: P, run_id: S) -> Self {
        Self {
            run_id: run_id.into(),
            log_target: DEFAULT_LOG_TARGET.to_string(),
            output_dir: output_dir.into(),
        }
    }

    pub fn with_log_target<S: Into<String>>(mut self, target: S) -> Self {
        self.log_target = target.into();
        self
    }

    #[inline]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[inline]
    pub fn log_target(&self) -> &str {
        &self.log_target
    }

    #[inline]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
