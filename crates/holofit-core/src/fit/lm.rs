//! Bounded Levenberg–Marquardt iteration for the Kogelnik fit.
//!
//! Each iteration builds a forward-difference Jacobian, solves the
//! Marquardt-damped normal equations over the parameters that are free to
//! move, projects the trial point back into the parameter box and accepts
//! it only if the cost drops. Damping shrinks after an accepted step and
//! grows after a rejected one.
//!
//! A parameter resting on a bound with the descent direction pointing out
//! of the box is held fixed for that iteration, so the remaining parameter
//! takes a reduced step instead of one carrying coupling to a direction it
//! cannot follow.

use nalgebra::{Matrix2, Vector2};
use ndarray::{Array1, Array2};

use super::normal::{damped_step, is_singular, normal_equations, restrict};
use super::{FitBounds, FitOptions};
use crate::error::{HolofitError, Result};
use crate::model::EfficiencyModel;

/// Damping beyond which no productive step can be found.
const MAX_DAMPING: f64 = 1e16;
const MIN_DAMPING: f64 = 1e-15;

/// Residuals of one model against one observed curve.
pub struct Problem<'a> {
    pub model: &'a dyn EfficiencyModel,
    pub angles_deg: &'a [f64],
    pub observed: &'a [f64],
}

impl Problem<'_> {
    /// Model minus observation at `p = [modulation, thickness]`.
    pub fn residuals(&self, p: &[f64; 2]) -> Array1<f64> {
        self.angles_deg
            .iter()
            .zip(self.observed)
            .map(|(&angle, &obs)| self.model.efficiency_at(angle, p[0], p[1]) - obs)
            .collect()
    }

    /// Forward-difference Jacobian of the residuals, shape `(N, 2)`.
    ///
    /// Steps are taken away from a bound the parameter already touches.
    pub fn jacobian(&self, p: &[f64; 2], base: &Array1<f64>, bounds: &FitBounds) -> Array2<f64> {
        let n = self.angles_deg.len();
        let mut jac = Array2::<f64>::zeros((n, 2));
        let limits = bounds.as_array();
        for k in 0..2 {
            let mut h = f64::EPSILON.sqrt() * p[k].abs().max(1.0);
            if p[k] + h > limits[k][1] {
                h = -h;
            }
            let mut shifted = *p;
            shifted[k] += h;
            let actual_h = shifted[k] - p[k];
            let r = self.residuals(&shifted);
            for i in 0..n {
                jac[[i, k]] = (r[i] - base[i]) / actual_h;
            }
        }
        jac
    }
}

/// Where the iteration ended up.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub params: [f64; 2],
    pub residuals: Array1<f64>,
    pub jacobian: Array2<f64>,
    pub iterations: usize,
}

fn half_sum_squares(r: &Array1<f64>) -> f64 {
    0.5 * r.dot(r)
}

/// Whether moving `p[k]` by `direction` would leave the box.
fn leaves_box(p: &[f64; 2], k: usize, direction: f64, bounds: &FitBounds) -> bool {
    let limits = bounds.as_array();
    (p[k] <= limits[k][0] && direction < 0.0) || (p[k] >= limits[k][1] && direction > 0.0)
}

/// Parameters free to move: not pinned against a bound by the descent
/// direction $-J^T r$.
fn free_set(p: &[f64; 2], gradient: &Vector2<f64>, bounds: &FitBounds) -> [bool; 2] {
    [
        !leaves_box(p, 0, -gradient[0], bounds),
        !leaves_box(p, 1, -gradient[1], bounds),
    ]
}

/// Gradient with components zeroed where descent would leave the box.
fn projected_gradient(p: &[f64; 2], gradient: &Vector2<f64>, bounds: &FitBounds) -> [f64; 2] {
    let free = free_set(p, gradient, bounds);
    let mut g = [gradient[0], gradient[1]];
    for k in 0..2 {
        if !free[k] {
            g[k] = 0.0;
        }
    }
    g
}

fn max_abs(g: &[f64; 2]) -> f64 {
    g[0].abs().max(g[1].abs())
}

/// Damped step restricted to the free parameters.
///
/// A free parameter sitting on a bound whose coupled step would still push
/// it outward is pinned as well and the step is solved again.
fn bounded_step(
    p: &[f64; 2],
    jtj: &Matrix2<f64>,
    gradient: &Vector2<f64>,
    lambda: f64,
    bounds: &FitBounds,
) -> Option<Vector2<f64>> {
    let mut free = free_set(p, gradient, bounds);
    loop {
        let (reduced_jtj, reduced_gradient) = restrict(jtj, gradient, free);
        let step = damped_step(&reduced_jtj, &reduced_gradient, lambda)?;
        let blocked: Vec<usize> = (0..2)
            .filter(|&k| free[k] && leaves_box(p, k, step[k], bounds))
            .collect();
        if blocked.is_empty() {
            return Some(step);
        }
        for k in blocked {
            free[k] = false;
        }
    }
}

/// Run the bounded iteration from a feasible `start`.
///
/// # Errors
/// [`HolofitError::FitDidNotConverge`] when the Jacobian is singular at
/// `start`, the damping saturates away from a stationary point, or the
/// iteration budget runs out.
pub fn minimise(
    problem: &Problem<'_>,
    start: [f64; 2],
    bounds: &FitBounds,
    options: &FitOptions,
) -> Result<Minimum> {
    let mut p = start;
    let mut r = problem.residuals(&p);
    let mut cost = half_sum_squares(&r);
    let mut jac = problem.jacobian(&p, &r, bounds);
    let mut lambda = options.initial_damping;

    let (jtj0, gradient0) = normal_equations(&jac, &r);
    if is_singular(&jtj0) {
        return Err(HolofitError::no_convergence(format!(
            "Jacobian is singular at the initial guess (modulation={}, thickness={})",
            start[0], start[1]
        )));
    }
    // Saturated damping is only accepted this close to stationarity.
    let stall_tolerance = options.gtol.sqrt() * max_abs(&projected_gradient(&p, &gradient0, bounds));

    for iteration in 1..=options.max_iterations {
        let (jtj, gradient) = normal_equations(&jac, &r);

        let pg = projected_gradient(&p, &gradient, bounds);
        if cost == 0.0 || max_abs(&pg) <= options.gtol {
            log::debug!("LM: gradient tolerance reached at iteration {iteration}");
            return Ok(Minimum { params: p, residuals: r, jacobian: jac, iterations: iteration });
        }

        // Inner loop: raise damping until a step lowers the cost.
        let accepted = loop {
            let Some(delta) = bounded_step(&p, &jtj, &gradient, lambda, bounds) else {
                lambda *= 10.0;
                if lambda > MAX_DAMPING {
                    break None;
                }
                continue;
            };

            let trial = bounds.clamp([p[0] + delta[0], p[1] + delta[1]]);
            let r_trial = problem.residuals(&trial);
            let cost_trial = half_sum_squares(&r_trial);

            if cost_trial.is_finite() && cost_trial < cost {
                lambda = (lambda / 3.0).max(MIN_DAMPING);
                break Some((trial, r_trial, cost_trial));
            }

            lambda *= 2.0;
            if lambda > MAX_DAMPING {
                break None;
            }
        };

        let Some((trial, r_trial, cost_trial)) = accepted else {
            let residual_gradient = max_abs(&pg);
            if residual_gradient <= stall_tolerance {
                log::debug!("LM: damping saturated at iteration {iteration}, cost={cost:.3e}");
                return Ok(Minimum { params: p, residuals: r, jacobian: jac, iterations: iteration });
            }
            return Err(HolofitError::no_convergence(format!(
                "damping saturated at iteration {iteration} with projected gradient \
                 {residual_gradient:.3e} (cost={cost:.3e})"
            )));
        };

        let step = [trial[0] - p[0], trial[1] - p[1]];
        let f_converged = cost - cost_trial <= options.ftol * cost;
        let x_converged = (0..2).all(|k| step[k].abs() <= options.xtol * (options.xtol + trial[k].abs()));

        log::debug!(
            "LM iter {iteration}: modulation={:.6e}, thickness={:.6}, cost={:.6e}, λ={:.1e}",
            trial[0],
            trial[1],
            cost_trial,
            lambda
        );

        p = trial;
        r = r_trial;
        cost = cost_trial;
        jac = problem.jacobian(&p, &r, bounds);

        if f_converged || x_converged {
            return Ok(Minimum { params: p, residuals: r, jacobian: jac, iterations: iteration });
        }
    }

    Err(HolofitError::no_convergence(format!(
        "iteration budget of {} exhausted (cost={:.3e})",
        options.max_iterations, cost
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grating::GratingParameters;
    use crate::model::LosslessPhaseGrating;

    fn synthetic(model: &dyn EfficiencyModel, angles: &[f64], p: [f64; 2]) -> Vec<f64> {
        model.efficiencies(angles, p[0], p[1])
    }

    #[test]
    fn test_residuals_vanish_at_truth() {
        let model = LosslessPhaseGrating::new(GratingParameters::new(0.8, 0.633, 1.5).unwrap());
        let angles: Vec<f64> = (-10..=10).map(|i| i as f64 * 0.3).collect();
        let observed = synthetic(&model, &angles, [0.01, 20.0]);
        let problem = Problem { model: &model, angles_deg: &angles, observed: &observed };
        let r = problem.residuals(&[0.01, 20.0]);
        assert!(r.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_jacobian_steps_inward_at_upper_bound() {
        let model = LosslessPhaseGrating::new(GratingParameters::new(0.8, 0.633, 1.5).unwrap());
        let angles = [0.0, 0.5, 1.0];
        let observed = [0.0; 3];
        let problem = Problem { model: &model, angles_deg: &angles, observed: &observed };
        let bounds = FitBounds::new([0.0, 0.01], [0.0, 20.0]);
        let p = [0.01, 20.0];
        let base = problem.residuals(&p);
        let jac = problem.jacobian(&p, &base, &bounds);
        // On-Bragg efficiency grows with both parameters while ν < π/2.
        assert!(jac[[0, 0]] > 0.0);
        assert!(jac[[0, 1]] > 0.0);
    }

    /// Cost with a kink at its starting point: every step raises it.
    struct Kinked;

    impl EfficiencyModel for Kinked {
        fn name(&self) -> &str {
            "kinked"
        }

        fn coupling_strength(&self, modulation: f64, _thickness: f64) -> f64 {
            modulation
        }

        fn efficiency_at(&self, detuning_deg: f64, modulation: f64, thickness: f64) -> f64 {
            (modulation - 0.5).abs() + detuning_deg * detuning_deg * (thickness - 1.0).abs()
        }
    }

    #[test]
    fn test_saturated_damping_away_from_stationarity_fails() {
        let angles = [-1.0, 0.5, 2.0];
        let observed = [-1.0; 3];
        let problem = Problem { model: &Kinked, angles_deg: &angles, observed: &observed };
        let bounds = FitBounds::new([0.0, 1.0], [0.0, 2.0]);
        let err = minimise(&problem, [0.5, 1.0], &bounds, &FitOptions::default()).unwrap_err();
        match err {
            HolofitError::FitDidNotConverge { reason } => assert!(reason.contains("damping saturated")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_pinned_parameter_takes_no_step() {
        let bounds = FitBounds::new([0.0, 1.0], [0.0, 1.0]);
        let jtj = Matrix2::new(4.0, 1.0, 1.0, 3.0);
        // Descent pushes thickness above its upper bound.
        let gradient = Vector2::new(2.0, -6.0);
        let step = bounded_step(&[0.5, 1.0], &jtj, &gradient, 0.5, &bounds).unwrap();
        assert_eq!(step[1], 0.0);
        assert!(step[0] < 0.0);
    }

    #[test]
    fn test_coupled_step_out_of_the_box_is_pinned() {
        let bounds = FitBounds::new([0.0, 1.0], [0.0, 1.0]);
        // Modulation sits on its lower bound with zero gradient; the full
        // coupled step would still drive it negative.
        let jtj = Matrix2::new(1.0, 0.9, 0.9, 1.0);
        let gradient = Vector2::new(0.0, -1.0);
        let step = bounded_step(&[0.0, 0.5], &jtj, &gradient, 0.0, &bounds).unwrap();
        assert_eq!(step[0], 0.0);
        assert!(step[1] > 0.0);
    }

    #[test]
    fn test_projected_gradient_masks_active_bounds() {
        let bounds = FitBounds::new([0.0, 1.0], [0.0, 1.0]);
        let g = projected_gradient(&[0.0, 1.0], &Vector2::new(2.0, -3.0), &bounds);
        assert_eq!(g, [0.0, 0.0]);
        let g = projected_gradient(&[0.0, 1.0], &Vector2::new(-2.0, 3.0), &bounds);
        assert_eq!(g, [-2.0, 3.0]);
    }
}
