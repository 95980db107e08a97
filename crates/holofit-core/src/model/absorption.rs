//! Absorption-modulated transmission grating.
//!
//! $$\eta(\theta) = e^{-2\alpha_0 T/\cos\theta_B}\,
//!   \frac{\sinh^2\sqrt{\nu^2 - E^2}}{1 - E^2/\nu^2},
//! \qquad \nu = \frac{\alpha_1 T}{2\cos\theta_B}$$
//!
//! Past $E = \nu$ the square root turns imaginary and the hyperbolic sine
//! becomes a trigonometric one. Evaluating $\nu^2 |\sinh(s)/s|^2$ with a
//! complex $s$ covers both sides of the crossing with one expression.

use num_complex::Complex64;

use super::{dephasing, EfficiencyModel, SERIES_THRESHOLD};
use crate::grating::GratingParameters;

/// Kogelnik solution for an unslanted absorption grating.
///
/// `modulation` is the absorption modulation $\alpha_1$ (µm⁻¹). The bulk
/// absorption $\alpha_0$ comes from the grating's film absorption, zero
/// when unset.
#[derive(Debug, Clone, Copy)]
pub struct AbsorptionGrating {
    params: GratingParameters,
}

impl AbsorptionGrating {
    pub fn new(params: GratingParameters) -> Self {
        Self { params }
    }

    /// Bulk transmission loss $e^{-2\alpha_0 T/\cos\theta_B}$.
    pub fn attenuation(&self, thickness: f64) -> f64 {
        let alpha0 = self.params.film_absorption().unwrap_or(0.0);
        (-2.0 * alpha0 * thickness / self.params.bragg_angle().cos()).exp()
    }
}

impl EfficiencyModel for AbsorptionGrating {
    fn name(&self) -> &str {
        "Absorption grating"
    }

    fn coupling_strength(&self, modulation: f64, thickness: f64) -> f64 {
        modulation * thickness / (2.0 * self.params.bragg_angle().cos())
    }

    fn efficiency_at(&self, detuning_deg: f64, modulation: f64, thickness: f64) -> f64 {
        let v = self.coupling_strength(modulation, thickness);
        let e = dephasing(&self.params, detuning_deg, thickness);
        let s = Complex64::new(v * v - e * e, 0.0).sqrt();
        let sinhc_sq = if s.norm() < SERIES_THRESHOLD {
            1.0
        } else {
            (s.sinh() / s).norm_sqr()
        };
        self.attenuation(thickness) * v * v * sinhc_sq
    }
}
