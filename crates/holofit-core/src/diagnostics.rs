//! Reality-check scalars for a fitted grating.
//!
//! - Phase parameter $\nu$: coupling strength of the fitted model.
//! - Cook-Klein $Q = 2\pi\lambda T / (n \Lambda^2)$: thin ($Q \lesssim 1$,
//!   Raman-Nath) versus thick ($Q \gtrsim 10$, Bragg) diffraction.
//! - Moharam-Young $\rho = \lambda^2 / (n\, n_1 \Lambda^2)$: refines the
//!   regime boundary with the modulation depth.
//!
//! Also provides the peak-only analytical estimate and the measured
//! angular bandwidth that are displayed next to a fit.
//!
//! # Reference
//! M. G. Moharam and L. Young, *Appl. Opt.* **17**, 1757 (1978).

use serde::{Deserialize, Serialize};

use crate::error::{HolofitError, Result};
use crate::grating::GratingParameters;
use crate::model::ModelVariant;
use crate::spline::CubicSpline;
use crate::types::NormalizedScan;

const RAMAN_NATH_LIMIT: f64 = 1.0;
const BRAGG_LIMIT: f64 = 10.0;

/// Samples per side used to bracket a half-maximum crossing.
const CROSSING_SAMPLES: usize = 400;

/// Diffraction regime implied by the Cook-Klein parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffractionRegime {
    /// $Q < 1$: thin grating, many orders.
    RamanNath,
    /// $1 \le Q \le 10$.
    Intermediate,
    /// $Q > 10$: thick grating, a single diffracted order.
    Bragg,
}

impl DiffractionRegime {
    pub fn from_cook_klein(q: f64) -> Self {
        if q < RAMAN_NATH_LIMIT {
            Self::RamanNath
        } else if q > BRAGG_LIMIT {
            Self::Bragg
        } else {
            Self::Intermediate
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::RamanNath => "Raman-Nath (thin)",
            Self::Intermediate => "intermediate",
            Self::Bragg => "Bragg (thick)",
        }
    }
}

/// Derived scalars for display next to a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub phase_parameter: f64,
    pub cook_klein: f64,
    pub moharam_young: f64,
    pub regime: DiffractionRegime,
}

/// Compute all diagnostics for a modulation/thickness pair.
pub fn diagnostics(
    modulation: f64,
    thickness: f64,
    params: &GratingParameters,
    variant: ModelVariant,
) -> Diagnostics {
    let q = cook_klein(thickness, params);
    Diagnostics {
        phase_parameter: variant.model(params).coupling_strength(modulation, thickness),
        cook_klein: q,
        moharam_young: moharam_young(modulation, params, variant),
        regime: DiffractionRegime::from_cook_klein(q),
    }
}

/// Cook-Klein parameter $Q = 2\pi\lambda T / (n \Lambda^2)$.
pub fn cook_klein(thickness: f64, params: &GratingParameters) -> f64 {
    let period = params.period();
    2.0 * std::f64::consts::PI * params.wavelength_air() * thickness
        / (params.film_index() * period * period)
}

/// Moharam-Young parameter $\rho = \lambda^2 / (n\, n_1 \Lambda^2)$.
///
/// For absorption gratings the index modulation with the same coupling
/// strength, $n_1 = \alpha_1 \lambda / (2\pi)$, stands in for $n_1$.
/// Infinite when the modulation is zero.
pub fn moharam_young(modulation: f64, params: &GratingParameters, variant: ModelVariant) -> f64 {
    let lambda = params.wavelength_air();
    let period = params.period();
    let index_modulation = match variant {
        ModelVariant::LosslessPhase => modulation,
        ModelVariant::AbsorptionGrating => modulation * lambda / (2.0 * std::f64::consts::PI),
    };
    if index_modulation == 0.0 {
        return f64::INFINITY;
    }
    lambda * lambda / (params.film_index() * index_modulation * period * period)
}

/// Peak-only estimate of a lossless grating's modulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyticalEstimate {
    /// $\nu_a = \arcsin\sqrt{\eta_{\max}}$.
    pub phase_parameter: f64,
    /// Index modulation reproducing $\nu_a$ at the assumed thickness.
    pub modulation: f64,
    /// Thickness the estimate assumes (µm).
    pub thickness: f64,
}

/// Invert the on-Bragg efficiency $\eta_{\max} = \sin^2\nu$ for the
/// modulation, assuming a known thickness.
///
/// Only the first branch ($\nu \le \pi/2$) is returned; an over-modulated
/// grating produces the same peak efficiency on a later branch.
pub fn analytical_estimate(
    max_efficiency: f64,
    thickness: f64,
    params: &GratingParameters,
) -> Result<AnalyticalEstimate> {
    if !(0.0..=1.0).contains(&max_efficiency) {
        return Err(HolofitError::InvalidScanData(format!(
            "peak efficiency {max_efficiency} lies outside [0, 1]"
        )));
    }
    if !thickness.is_finite() || thickness <= 0.0 {
        return Err(HolofitError::InvalidGeometry(format!(
            "assumed thickness must be positive, got {thickness}"
        )));
    }
    let nu = max_efficiency.sqrt().asin();
    let modulation = nu * params.wavelength_air() * params.bragg_angle().cos()
        / (std::f64::consts::PI * thickness);
    Ok(AnalyticalEstimate {
        phase_parameter: nu,
        modulation,
        thickness,
    })
}

/// Full width at half maximum of a measured curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bandwidth {
    /// Lower half-maximum crossing (degrees detuning).
    pub lower_deg: f64,
    /// Upper half-maximum crossing (degrees detuning).
    pub upper_deg: f64,
    pub fwhm_deg: f64,
}

/// Angular bandwidth of the measured curve around its centred peak.
///
/// A natural cubic spline is run through the scan sorted by angle; the
/// half-maximum crossings are searched outward from zero detuning. Returns
/// `None` for scans with repeated angles, fewer than three points, a
/// non-positive peak, or a side that never falls to half maximum.
pub fn angular_bandwidth(scan: &NormalizedScan) -> Option<Bandwidth> {
    if scan.len() < 3 || scan.max_efficiency() <= 0.0 {
        return None;
    }
    let mut points: Vec<(f64, f64)> = scan.points().collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (xs, ys): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();

    let spline = CubicSpline::new(xs, ys)?;
    let (lo, hi) = spline.domain();
    let half = 0.5 * scan.max_efficiency();

    let lower_deg = spline.descend_to(half, 0.0, lo, CROSSING_SAMPLES)?;
    let upper_deg = spline.descend_to(half, 0.0, hi, CROSSING_SAMPLES)?;
    Some(Bandwidth {
        lower_deg,
        upper_deg,
        fwhm_deg: upper_deg - lower_deg,
    })
}
