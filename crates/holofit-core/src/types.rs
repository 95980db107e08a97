//! Core data structures passed between the pipeline stages.
//!
//! Raw readings enter as [`ScanPoint`]s, leave the normaliser as a
//! [`NormalizedScan`], and the fit engine turns that into a [`FitResult`].

use serde::{Deserialize, Serialize};

use crate::diagnostics::{self, Diagnostics};
use crate::error::{HolofitError, Result};
use crate::grating::GratingParameters;
use crate::model::{predict_efficiency, ModelVariant};

/// A single reading from an angular scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    /// Probe angle in air (degrees).
    pub angle_deg: f64,
    /// Raw detector reading, percent scale (0–100).
    pub raw_signal: f64,
}

impl ScanPoint {
    pub fn new(angle_deg: f64, raw_signal: f64) -> Self {
        Self {
            angle_deg,
            raw_signal,
        }
    }
}

/// Diffraction efficiency against detuning angle, peak re-centred to zero.
///
/// Efficiencies outside $[0, 1]$ are kept as-is: this is curve-fit input,
/// not a hard physical domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScan {
    angles_deg: Vec<f64>,
    efficiencies: Vec<f64>,
    /// Raw angle that was subtracted to centre the peak (degrees).
    peak_angle_deg: f64,
    /// Largest efficiency in the scan (DE_max).
    max_efficiency: f64,
}

impl NormalizedScan {
    /// Wrap data whose angles are already detuning angles.
    ///
    /// Use this for synthetic curves or data normalised elsewhere; the
    /// angle axis is taken verbatim.
    pub fn from_centred(angles_deg: Vec<f64>, efficiencies: Vec<f64>) -> Result<Self> {
        validate_columns(&angles_deg, &efficiencies)?;
        let max_efficiency = efficiencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self {
            angles_deg,
            efficiencies,
            peak_angle_deg: 0.0,
            max_efficiency,
        })
    }

    pub(crate) fn from_parts(
        angles_deg: Vec<f64>,
        efficiencies: Vec<f64>,
        peak_angle_deg: f64,
        max_efficiency: f64,
    ) -> Self {
        Self {
            angles_deg,
            efficiencies,
            peak_angle_deg,
            max_efficiency,
        }
    }

    pub fn angles_deg(&self) -> &[f64] {
        &self.angles_deg
    }

    pub fn efficiencies(&self) -> &[f64] {
        &self.efficiencies
    }

    pub fn peak_angle_deg(&self) -> f64 {
        self.peak_angle_deg
    }

    pub fn max_efficiency(&self) -> f64 {
        self.max_efficiency
    }

    pub fn len(&self) -> usize {
        self.angles_deg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles_deg.is_empty()
    }

    /// Iterate `(detuning_deg, efficiency)` pairs in scan order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.angles_deg
            .iter()
            .copied()
            .zip(self.efficiencies.iter().copied())
    }
}

fn validate_columns(angles_deg: &[f64], efficiencies: &[f64]) -> Result<()> {
    if angles_deg.is_empty() {
        return Err(HolofitError::InvalidScanData("scan contains no points".into()));
    }
    if angles_deg.len() != efficiencies.len() {
        return Err(HolofitError::InvalidScanData(format!(
            "{} angles but {} efficiencies",
            angles_deg.len(),
            efficiencies.len()
        )));
    }
    for (i, (a, e)) in angles_deg.iter().zip(efficiencies).enumerate() {
        if !a.is_finite() || !e.is_finite() {
            return Err(HolofitError::InvalidScanData(format!(
                "non-finite value at point {i}: angle={a}, efficiency={e}"
            )));
        }
    }
    Ok(())
}

/// Outcome of one successful curve fit.
///
/// Superseded, never updated, by a later fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Model the parameters belong to.
    pub variant: ModelVariant,
    /// Best-fit modulation: index modulation $n_1$, or absorption
    /// modulation $\alpha_1$ (µm⁻¹) for absorption gratings.
    pub modulation: f64,
    pub modulation_stderr: f64,
    /// Best-fit film thickness (µm).
    pub thickness: f64,
    pub thickness_stderr: f64,
    /// Parameter covariance, order `[modulation, thickness]`.
    pub covariance: [[f64; 2]; 2],
    /// Correlation matrix derived from `covariance`.
    pub correlation: [[f64; 2]; 2],
    /// Phase parameter $\nu$ at the fitted values.
    pub phase_parameter: f64,
    /// Cook-Klein $Q$ at the fitted thickness.
    pub cook_klein: f64,
    /// Moharam-Young $\rho$ at the fitted modulation.
    pub moharam_young: f64,
    /// Sum of squared residuals at the optimum.
    pub residual_sum_squares: f64,
    /// SSR per degree of freedom ($N - 2$).
    pub reduced_chi_squared: f64,
    /// Coefficient of determination of the fitted curve.
    pub r_squared: f64,
    /// Optimiser iterations taken.
    pub iterations: usize,
    /// Number of scan points fitted.
    pub points: usize,
}

impl FitResult {
    /// Recompute the full diagnostic set, including the regime label.
    pub fn diagnostics(&self, params: &GratingParameters) -> Diagnostics {
        diagnostics::diagnostics(self.modulation, self.thickness, params, self.variant)
    }

    /// Evaluate the fitted model on an arbitrary angle grid.
    pub fn fitted_curve(&self, angles_deg: &[f64], params: &GratingParameters) -> Vec<f64> {
        predict_efficiency(angles_deg, self.modulation, self.thickness, params, self.variant)
    }
}
