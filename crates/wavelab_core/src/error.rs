use thiserror::Error;

/// Failures raised by the analysis routines. Every error aborts the call; no partial
/// results are returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Input array has the wrong shape for the requested operation.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// A linear solve or time integration failed numerically.
    #[error("Solver divergence: {0}")]
    SolverDivergence(String),

    /// Unknown method flag/name or out-of-range setting.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Returns early with an [`AnalysisError`] built from a format string, in the manner of
/// `anyhow::bail!`.
macro_rules! fail {
    ($kind:ident, $($arg:tt)*) => {
        return Err($crate::error::AnalysisError::$kind(format!($($arg)*)))
    };
}

pub(crate) use fail;
