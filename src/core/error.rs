use crate::core::report::ReportError;
use thiserror::Error;

/// Failures that stop a whole run. Per-file problems never end up here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid directory path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Could not start fingerprint workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Could not write report: {0}")]
    Write(#[from] ReportError),
}
