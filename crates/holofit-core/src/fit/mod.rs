//! Curve fit engine: bounded nonlinear least squares around a forward model.
//!
//! [`fit`] minimises $\sum_i (\eta_{\text{model}}(\theta_i) - \eta_i)^2$
//! over modulation and thickness inside a parameter box. The engine keeps
//! no state between calls and never retries; trying another initial guess
//! is the caller's decision.
//!
//! The covariance follows the unweighted least-squares convention
//! $\mathrm{cov} = (J^T J)^{-1} \cdot \mathrm{SSR}/(N - 2)$.

pub mod lm;
pub mod normal;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{cook_klein, moharam_young};
use crate::error::{HolofitError, Result};
use crate::grating::GratingParameters;
use crate::model::ModelVariant;
use crate::types::{FitResult, NormalizedScan};

/// Starting point of the optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitGuess {
    pub modulation: f64,
    /// Film thickness (µm).
    pub thickness: f64,
}

impl FitGuess {
    pub fn new(modulation: f64, thickness: f64) -> Self {
        Self {
            modulation,
            thickness,
        }
    }
}

/// Closed box constraints `[lower, upper]` on each parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitBounds {
    pub modulation: [f64; 2],
    pub thickness: [f64; 2],
}

impl FitBounds {
    pub fn new(modulation: [f64; 2], thickness: [f64; 2]) -> Self {
        Self {
            modulation,
            thickness,
        }
    }

    /// Bounds starting at zero with the given upper limits.
    pub fn upper(modulation_max: f64, thickness_max: f64) -> Self {
        Self::new([0.0, modulation_max], [0.0, thickness_max])
    }

    /// Wide limits suited to typical photopolymer gratings.
    ///
    /// Index modulation up to 0.05 or absorption modulation up to 1 µm⁻¹,
    /// thickness up to 50 µm.
    pub fn default_for(variant: ModelVariant) -> Self {
        match variant {
            ModelVariant::LosslessPhase => Self::upper(0.05, 50.0),
            ModelVariant::AbsorptionGrating => Self::upper(1.0, 50.0),
        }
    }

    pub(crate) fn as_array(&self) -> [[f64; 2]; 2] {
        [self.modulation, self.thickness]
    }

    /// Project a parameter pair into the box.
    pub fn clamp(&self, p: [f64; 2]) -> [f64; 2] {
        let limits = self.as_array();
        [
            p[0].clamp(limits[0][0], limits[0][1]),
            p[1].clamp(limits[1][0], limits[1][1]),
        ]
    }

    pub fn contains(&self, guess: &FitGuess) -> bool {
        let within = |v: f64, [lo, hi]: [f64; 2]| v >= lo && v <= hi;
        within(guess.modulation, self.modulation) && within(guess.thickness, self.thickness)
    }

    /// Reject non-finite or inverted intervals.
    pub fn validate(&self) -> Result<()> {
        for (name, [lo, hi]) in [("modulation", self.modulation), ("thickness", self.thickness)] {
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                return Err(HolofitError::no_convergence(format!(
                    "{name} bounds [{lo}, {hi}] do not form a finite interval"
                )));
            }
        }
        Ok(())
    }
}

/// Iteration budget and stopping tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Maximum outer iterations (Jacobian evaluations).
    pub max_iterations: usize,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Absolute tolerance on the projected gradient.
    pub gtol: f64,
    /// Starting Marquardt damping.
    pub initial_damping: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            initial_damping: 1e-3,
        }
    }
}

/// Fit a forward model to a normalised scan.
///
/// # Arguments
/// * `scan` - Detuning angles and observed efficiencies.
/// * `params` - Grating context shared with the model.
/// * `variant` - Which coupled-wave solution to fit.
/// * `guess` - Starting point; must lie inside `bounds`.
/// * `bounds` - Box constraints on modulation and thickness.
/// * `options` - Iteration budget and tolerances.
///
/// # Errors
/// - [`HolofitError::InvalidScanData`] for scans with fewer than two points.
/// - [`HolofitError::FitDidNotConverge`] for inconsistent bounds, a guess
///   outside the bounds, a singular Jacobian at the guess or the solution,
///   or an exhausted iteration budget.
pub fn fit(
    scan: &NormalizedScan,
    params: &GratingParameters,
    variant: ModelVariant,
    guess: FitGuess,
    bounds: FitBounds,
    options: &FitOptions,
) -> Result<FitResult> {
    if scan.len() < 2 {
        return Err(HolofitError::InvalidScanData(format!(
            "a two-parameter fit needs at least 2 points, got {}",
            scan.len()
        )));
    }
    bounds.validate()?;
    if !bounds.contains(&guess) {
        return Err(HolofitError::no_convergence(format!(
            "initial guess (modulation={}, thickness={}) lies outside bounds \
             modulation={:?}, thickness={:?}",
            guess.modulation, guess.thickness, bounds.modulation, bounds.thickness
        )));
    }
    if options.max_iterations == 0 {
        return Err(HolofitError::no_convergence("iteration budget is zero"));
    }

    let model = variant.model(params);
    let problem = lm::Problem {
        model: model.as_ref(),
        angles_deg: scan.angles_deg(),
        observed: scan.efficiencies(),
    };

    log::info!(
        "Fitting {} to {} points from modulation={}, thickness={} µm",
        model.name(),
        scan.len(),
        guess.modulation,
        guess.thickness
    );

    let minimum = lm::minimise(&problem, [guess.modulation, guess.thickness], &bounds, options)?;

    let (jtj, _) = normal::normal_equations(&minimum.jacobian, &minimum.residuals);
    let inverse = normal::invert_normal(&jtj).ok_or_else(|| {
        HolofitError::no_convergence("Jacobian is singular at the solution; covariance undefined")
    })?;

    let n = scan.len();
    let ssr = minimum.residuals.dot(&minimum.residuals);
    let dof = n.saturating_sub(2);
    let scale = if dof > 0 { ssr / dof as f64 } else { 1.0 };
    let cov = inverse * scale;
    let covariance = [[cov[(0, 0)], cov[(0, 1)]], [cov[(1, 0)], cov[(1, 1)]]];

    let [modulation, thickness] = minimum.params;
    let modulation_stderr = covariance[0][0].max(0.0).sqrt();
    let thickness_stderr = covariance[1][1].max(0.0).sqrt();

    let result = FitResult {
        variant,
        modulation,
        modulation_stderr,
        thickness,
        thickness_stderr,
        covariance,
        correlation: correlation(&covariance),
        phase_parameter: model.coupling_strength(modulation, thickness),
        cook_klein: cook_klein(thickness, params),
        moharam_young: moharam_young(modulation, params, variant),
        residual_sum_squares: ssr,
        reduced_chi_squared: if dof > 0 { ssr / dof as f64 } else { f64::NAN },
        r_squared: r_squared(scan.efficiencies(), ssr),
        iterations: minimum.iterations,
        points: n,
    };

    log::info!(
        "Converged after {} iterations: modulation={:.4e} ± {:.2e}, thickness={:.3} ± {:.2e} µm",
        result.iterations,
        result.modulation,
        result.modulation_stderr,
        result.thickness,
        result.thickness_stderr
    );

    Ok(result)
}

fn correlation(cov: &[[f64; 2]; 2]) -> [[f64; 2]; 2] {
    let mut out = [[0.0; 2]; 2];
    for i in 0..2 {
        for j in 0..2 {
            let denom = (cov[i][i] * cov[j][j]).sqrt();
            out[i][j] = if denom > 0.0 { cov[i][j] / denom } else { 0.0 };
        }
    }
    out
}

fn r_squared(observed: &[f64], ssr: f64) -> f64 {
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let sst: f64 = observed.iter().map(|y| (y - mean).powi(2)).sum();
    if sst > 0.0 {
        1.0 - ssr / sst
    } else if ssr == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Everything one fit needs, bundled for callers that build requests from
/// configuration.
#[derive(Debug, Clone)]
pub struct FitRequest {
    pub scan: NormalizedScan,
    pub params: GratingParameters,
    pub variant: ModelVariant,
    pub guess: FitGuess,
    pub bounds: FitBounds,
    pub options: FitOptions,
}

impl FitRequest {
    /// Request with the variant implied by `params` and its default bounds.
    pub fn new(scan: NormalizedScan, params: GratingParameters, guess: FitGuess) -> Self {
        let variant = ModelVariant::for_grating(&params);
        Self {
            scan,
            params,
            variant,
            guess,
            bounds: FitBounds::default_for(variant),
            options: FitOptions::default(),
        }
    }

    pub fn run(&self) -> Result<FitResult> {
        fit(
            &self.scan,
            &self.params,
            self.variant,
            self.guess,
            self.bounds,
            &self.options,
        )
    }
}
