//! Error taxonomy shared by every stage of the fitting pipeline.

use thiserror::Error;

/// Errors raised by the Holofit core.
///
/// Each variant is a structured failure reported to the caller. The core
/// never substitutes defaults and never retries on its own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HolofitError {
    /// Non-physical grating/wavelength/index combination.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Empty scans, mismatched lengths or non-finite readings.
    #[error("Invalid scan data: {0}")]
    InvalidScanData(String),

    /// The optimiser could not produce a trustworthy minimum.
    #[error("Fit did not converge: {reason}")]
    FitDidNotConverge { reason: String },
}

impl HolofitError {
    pub(crate) fn no_convergence(reason: impl Into<String>) -> Self {
        Self::FitDidNotConverge {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, HolofitError>;
