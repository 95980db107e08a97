//! Fixed optical geometry of a transmission grating.
//!
//! Distances are in micrometres throughout, spatial frequency in lines/µm
//! and angles in radians unless a name says `_deg`.

use serde::Serialize;

use crate::error::{HolofitError, Result};

/// Compute the internal Bragg angle of an unslanted transmission grating.
///
/// $\theta_B = \arcsin\left(\frac{f \lambda}{2 n}\right)$
///
/// # Arguments
/// * `spatial_frequency` - Recorded fringe frequency $f$ (lines/µm).
/// * `wavelength_air` - Probe wavelength in air $\lambda$ (µm).
/// * `film_index` - Average refractive index $n$ of the recording film.
///
/// # Errors
/// [`HolofitError::InvalidGeometry`] when an input is non-finite or
/// non-positive, or when the arcsine argument leaves $[-1, 1]$.
pub fn compute_bragg_angle(
    spatial_frequency: f64,
    wavelength_air: f64,
    film_index: f64,
) -> Result<f64> {
    require_positive("spatial frequency", spatial_frequency)?;
    require_positive("probe wavelength", wavelength_air)?;
    require_positive("film refractive index", film_index)?;

    let argument = spatial_frequency * wavelength_air / (2.0 * film_index);
    if argument.abs() > 1.0 {
        return Err(HolofitError::InvalidGeometry(format!(
            "no Bragg angle exists: f·λ/(2n) = {argument:.4} exceeds 1 \
             (f = {spatial_frequency} l/µm, λ = {wavelength_air} µm, n = {film_index})"
        )));
    }
    Ok(argument.asin())
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(HolofitError::InvalidGeometry(format!(
            "{name} must be positive and finite, got {value}"
        )));
    }
    Ok(())
}

/// Validated optical context for the forward model and the fit engine.
///
/// Construct with [`GratingParameters::new`]; the Bragg angle is derived
/// once and the fields stay consistent for the lifetime of the value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GratingParameters {
    spatial_frequency: f64,
    wavelength_air: f64,
    film_index: f64,
    film_absorption: Option<f64>,
    bragg_angle: f64,
}

impl GratingParameters {
    /// Build the grating context and derive its Bragg angle.
    pub fn new(spatial_frequency: f64, wavelength_air: f64, film_index: f64) -> Result<Self> {
        let bragg_angle = compute_bragg_angle(spatial_frequency, wavelength_air, film_index)?;
        if film_index <= 1.0 {
            return Err(HolofitError::InvalidGeometry(format!(
                "film refractive index must exceed 1, got {film_index}"
            )));
        }
        Ok(Self {
            spatial_frequency,
            wavelength_air,
            film_index,
            film_absorption: None,
            bragg_angle,
        })
    }

    /// Attach a bulk absorption coefficient $\alpha_0$ (µm⁻¹).
    ///
    /// A configured absorption selects the absorption-grating model when the
    /// variant is chosen with [`ModelVariant::for_grating`](crate::model::ModelVariant::for_grating).
    pub fn with_film_absorption(mut self, film_absorption: f64) -> Result<Self> {
        if !film_absorption.is_finite() || film_absorption < 0.0 {
            return Err(HolofitError::InvalidGeometry(format!(
                "film absorption must be finite and non-negative, got {film_absorption}"
            )));
        }
        self.film_absorption = Some(film_absorption);
        Ok(self)
    }

    pub fn spatial_frequency(&self) -> f64 {
        self.spatial_frequency
    }

    pub fn wavelength_air(&self) -> f64 {
        self.wavelength_air
    }

    pub fn film_index(&self) -> f64 {
        self.film_index
    }

    pub fn film_absorption(&self) -> Option<f64> {
        self.film_absorption
    }

    /// Internal Bragg angle (radians).
    pub fn bragg_angle(&self) -> f64 {
        self.bragg_angle
    }

    /// Fringe period $\Lambda = 1/f$ (µm).
    pub fn period(&self) -> f64 {
        1.0 / self.spatial_frequency
    }

    /// Lossless phase parameter $\nu = \pi n_1 T / (\lambda \cos\theta_B)$.
    pub fn phase_parameter(&self, modulation: f64, thickness: f64) -> f64 {
        std::f64::consts::PI * modulation * thickness
            / (self.wavelength_air * self.bragg_angle.cos())
    }

    /// Refract an external detuning angle (degrees) into the film (radians).
    pub fn internal_angle(&self, detuning_deg: f64) -> f64 {
        (detuning_deg.to_radians().sin() / self.film_index).asin()
    }
}
