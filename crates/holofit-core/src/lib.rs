//! # Holofit Core
//!
//! Numerical backbone of Holofit. This crate turns an angular scan of a
//! volume holographic grating into fitted grating parameters using
//! Kogelnik's coupled-wave theory.
//!
//! ## Pipeline
//!
//! 1. [`grating::GratingParameters`] derives the Bragg angle from the
//!    recording geometry.
//! 2. [`normalize::normalize`] turns raw detector readings into a
//!    [`types::NormalizedScan`] with the peak centred on zero detuning.
//! 3. [`fit::fit`] runs a bounded Levenberg–Marquardt fit of a
//!    [`model::EfficiencyModel`] and returns a [`types::FitResult`].
//! 4. [`diagnostics`] reports $\nu$, Cook-Klein $Q$ and Moharam-Young
//!    $\rho$ for the fitted parameters.
//!
//! ## Modules
//!
//! - [`grating`]: Grating context and Bragg geometry.
//! - [`normalize`]: Raw signal to efficiency conversion.
//! - [`model`]: Lossless and absorption forward models.
//! - [`fit`]: Bounded nonlinear least squares.
//! - [`diagnostics`]: Regime parameters, peak estimate, bandwidth.
//! - [`spline`]: Cubic spline used for bandwidth measurement.
//! - [`types`]: Data passed between the stages.

pub mod diagnostics;
pub mod error;
pub mod fit;
pub mod grating;
pub mod model;
pub mod normalize;
pub mod spline;
pub mod types;

pub use diagnostics::{analytical_estimate, angular_bandwidth, Diagnostics, DiffractionRegime};
pub use error::{HolofitError, Result};
pub use fit::{fit, FitBounds, FitGuess, FitOptions, FitRequest};
pub use grating::{compute_bragg_angle, GratingParameters};
pub use model::{predict_efficiency, EfficiencyModel, ModelVariant};
pub use normalize::{normalize, NormalizationMode};
pub use types::{FitResult, NormalizedScan, ScanPoint};
