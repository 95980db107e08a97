//! Lossless phase (refractive-index) transmission grating.
//!
//! $$\eta(\theta) = \frac{\sin^2\sqrt{\nu^2 + E^2}}{1 + E^2/\nu^2},
//! \qquad \nu = \frac{\pi n_1 T}{\lambda \cos\theta_B}$$
//!
//! Rewritten as $\nu^2 \,\mathrm{sinc}^2(s)$ with $s = \sqrt{\nu^2 + E^2}$,
//! which is the same expression without the $E^2/\nu^2$ quotient: a
//! vanishing modulation gives zero efficiency instead of `0/0`.

use super::{dephasing, EfficiencyModel, SERIES_THRESHOLD};
use crate::grating::GratingParameters;

/// Kogelnik solution for an unslanted lossless phase grating.
#[derive(Debug, Clone, Copy)]
pub struct LosslessPhaseGrating {
    params: GratingParameters,
}

impl LosslessPhaseGrating {
    pub fn new(params: GratingParameters) -> Self {
        Self { params }
    }
}

impl EfficiencyModel for LosslessPhaseGrating {
    fn name(&self) -> &str {
        "Lossless phase grating"
    }

    fn coupling_strength(&self, modulation: f64, thickness: f64) -> f64 {
        self.params.phase_parameter(modulation, thickness)
    }

    fn efficiency_at(&self, detuning_deg: f64, modulation: f64, thickness: f64) -> f64 {
        let v = self.coupling_strength(modulation, thickness);
        let e = dephasing(&self.params, detuning_deg, thickness);
        let s = (v * v + e * e).sqrt();
        let sinc = if s < SERIES_THRESHOLD {
            1.0 - s * s / 6.0
        } else {
            s.sin() / s
        };
        v * v * sinc * sinc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grating() -> GratingParameters {
        GratingParameters::new(0.8, 0.633, 1.5).unwrap()
    }

    #[test]
    fn test_on_bragg_reduces_to_sin_squared() {
        let model = LosslessPhaseGrating::new(grating());
        for &(rim, t) in &[(0.01, 20.0), (0.002, 8.0), (0.03, 35.0)] {
            let v = model.coupling_strength(rim, t);
            let eta = model.efficiency_at(0.0, rim, t);
            assert_relative_eq!(eta, v.sin().powi(2), max_relative = 1e-9);
        }
    }

    #[test]
    fn test_zero_modulation_gives_zero() {
        let model = LosslessPhaseGrating::new(grating());
        for angle in [-5.0, -0.5, 0.0, 0.5, 5.0] {
            assert_eq!(model.efficiency_at(angle, 0.0, 20.0), 0.0);
        }
    }

    #[test]
    fn test_matches_textbook_form_off_bragg() {
        let params = grating();
        let model = LosslessPhaseGrating::new(params);
        let (rim, t, angle) = (0.01, 20.0, 0.7);
        let v = params.phase_parameter(rim, t);
        let e = super::super::dephasing(&params, angle, t);
        let textbook = (v * v + e * e).sqrt().sin().powi(2) / (1.0 + e * e / (v * v));
        assert_relative_eq!(model.efficiency_at(angle, rim, t), textbook, max_relative = 1e-12);
    }

    #[test]
    fn test_curve_is_symmetric_and_bounded() {
        let model = LosslessPhaseGrating::new(grating());
        for i in 1..40 {
            let angle = i as f64 * 0.1;
            let plus = model.efficiency_at(angle, 0.01, 20.0);
            let minus = model.efficiency_at(-angle, 0.01, 20.0);
            assert_relative_eq!(plus, minus, max_relative = 1e-12);
            assert!((0.0..=1.0).contains(&plus));
        }
    }
}
