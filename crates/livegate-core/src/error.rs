use thiserror::Error;

/// Failure reported by an external landmark or embedding capability.
///
/// "No face in the frame" is not a failure; sources report it as `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("face model failed: {0}")]
    Model(String),
    #[error("source worker exited")]
    WorkerClosed,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no face found in frame")]
    NoFaceFound,
    #[error("descriptor dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("gallery has no enrolled identities")]
    EmptyGallery,
    #[error("source error: {0}")]
    Source(#[from] SourceError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
