//! Kogelnik coupled-wave forward models.
//!
//! The [`EfficiencyModel`] trait maps a detuning angle, a modulation
//! amplitude and a film thickness to a predicted first-order diffraction
//! efficiency. Two implementations cover the grating types Holofit fits:
//!
//! - [`LosslessPhaseGrating`]: refractive-index modulation, no loss.
//! - [`AbsorptionGrating`]: absorption modulation with bulk attenuation.
//!
//! Both share the off-Bragg dephasing term
//!
//! $$E = \theta_{\text{int}} \frac{2\pi n T \sin\theta_B}{\lambda}$$
//!
//! where $\theta_{\text{int}}$ is the detuning refracted into the film.
//!
//! # Reference
//! H. Kogelnik, "Coupled wave theory for thick hologram gratings",
//! *Bell Syst. Tech. J.* **48**, 2909 (1969).

pub mod absorption;
pub mod lossless;

pub use absorption::AbsorptionGrating;
pub use lossless::LosslessPhaseGrating;

use serde::{Deserialize, Serialize};

use crate::grating::GratingParameters;

/// Below this argument magnitude the `sin(s)/s` family uses its series.
pub(crate) const SERIES_THRESHOLD: f64 = 1e-6;

/// Which coupled-wave solution to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelVariant {
    /// Lossless refractive-index (phase) grating.
    LosslessPhase,
    /// Absorption-modulated grating with bulk attenuation.
    AbsorptionGrating,
}

impl ModelVariant {
    /// Pick the variant implied by the grating context: a configured film
    /// absorption means an absorption grating.
    pub fn for_grating(params: &GratingParameters) -> Self {
        if params.film_absorption().is_some() {
            Self::AbsorptionGrating
        } else {
            Self::LosslessPhase
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::LosslessPhase => "lossless-phase",
            Self::AbsorptionGrating => "absorption",
        }
    }

    /// Instantiate the model for a grating context.
    pub fn model(&self, params: &GratingParameters) -> Box<dyn EfficiencyModel> {
        match self {
            Self::LosslessPhase => Box::new(LosslessPhaseGrating::new(*params)),
            Self::AbsorptionGrating => Box::new(AbsorptionGrating::new(*params)),
        }
    }
}

/// A forward model of first-order diffraction efficiency.
///
/// Implementations capture their [`GratingParameters`] explicitly and are
/// pure functions of `(angle, modulation, thickness)`.
pub trait EfficiencyModel: Send + Sync {
    /// Human-readable name of the model.
    fn name(&self) -> &str;

    /// Coupling strength (phase parameter) $\nu$ for the given parameters.
    fn coupling_strength(&self, modulation: f64, thickness: f64) -> f64;

    /// Predicted efficiency at one detuning angle (degrees, in air).
    fn efficiency_at(&self, detuning_deg: f64, modulation: f64, thickness: f64) -> f64;

    /// Predicted efficiencies over a sequence of detuning angles.
    fn efficiencies(&self, angles_deg: &[f64], modulation: f64, thickness: f64) -> Vec<f64> {
        angles_deg
            .iter()
            .map(|&angle| self.efficiency_at(angle, modulation, thickness))
            .collect()
    }
}

/// Evaluate the selected model over `angles_deg`.
///
/// Returns one efficiency per angle, in the same order.
pub fn predict_efficiency(
    angles_deg: &[f64],
    modulation: f64,
    thickness: f64,
    params: &GratingParameters,
    variant: ModelVariant,
) -> Vec<f64> {
    variant.model(params).efficiencies(angles_deg, modulation, thickness)
}

/// Off-Bragg dephasing $E$ for a detuning angle (degrees, in air).
pub(crate) fn dephasing(params: &GratingParameters, detuning_deg: f64, thickness: f64) -> f64 {
    let theta_int = params.internal_angle(detuning_deg);
    theta_int * 2.0 * std::f64::consts::PI * params.film_index() * thickness
        * params.bragg_angle().sin()
        / params.wavelength_air()
}
