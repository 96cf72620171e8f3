use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced to the user as an alert.
///
/// Each one aborts only the operation that produced it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Don't have access to use your microphone.")]
    PermissionDenied,

    #[error("{0}")]
    SessionCreationFailed(String),

    #[error("Audio file is missing.")]
    FileMissing(PathBuf),

    #[error("Recording failed.")]
    RecordingFailed,
}

impl RecorderError {
    pub fn session(err: &anyhow::Error) -> Self {
        RecorderError::SessionCreationFailed(format!("{:#}", err))
    }
}
