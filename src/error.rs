use std::io;
use std::path::PathBuf;

/// Result type for pipeline stages.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised by the spectral pipeline.
///
/// Every variant is fatal: a run that hits one of these must not hand any
/// data to the inference layer.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid or missing configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Independently produced data products disagree with each other.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Channel frequency series of differing shapes.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("FFT failure: {0}")]
    Fft(String),

    #[error("malformed data file {}: line {line}: {reason}", path.display())]
    DataFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("malformed product file {}: {reason}", path.display())]
    Product { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    /// True for the consistency class, shape mismatches included.
    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency(_) | Self::ShapeMismatch { .. })
    }
}
