use thiserror::Error;

/// Errors surfaced by the alignment pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignError {
    /// Malformed input or an option the selected backend cannot honor.
    /// Raised before any pixel work happens.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// No similarity/affine solution exists for the given point sets.
    #[error("degenerate landmarks: {0}")]
    DegenerateLandmarks(String),
    /// Failure reported by the resampling engine.
    #[error("resampling failed: {0}")]
    Resample(String),
}

impl AlignError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateLandmarks(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AlignError>;
