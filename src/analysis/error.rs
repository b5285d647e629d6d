use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn one clip into features.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Audio decode failed for {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Resampling {path} failed: {reason}")]
    Resample { path: PathBuf, reason: String },
    #[error("No samples inside the analysis window of {path}")]
    EmptyWindow { path: PathBuf },
    #[error("Sample rate must be positive")]
    InvalidSampleRate,
}

impl ExtractionError {
    pub(crate) fn decode(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
