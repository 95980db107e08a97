//! Normal-equation algebra for the two-parameter least-squares problem.
//!
//! The Jacobian and residuals live in `ndarray` containers; the $2 \times 2$
//! systems they reduce to are solved with `nalgebra`.

use nalgebra::{Matrix2, Vector2};
use ndarray::{Array1, Array2};

/// Relative collinearity threshold on $\det(J^T J) / (a_{00} a_{11})$.
const SINGULAR_RATIO: f64 = 1e-12;

/// Form $J^T J$ and the gradient $J^T r$.
///
/// # Arguments
/// * `jacobian` - Shape `(N, 2)` sensitivity matrix.
/// * `residuals` - Length `N` vector of model minus observation.
pub fn normal_equations(
    jacobian: &Array2<f64>,
    residuals: &Array1<f64>,
) -> (Matrix2<f64>, Vector2<f64>) {
    debug_assert_eq!(jacobian.ncols(), 2, "Jacobian must have two columns");
    debug_assert_eq!(
        jacobian.nrows(),
        residuals.len(),
        "Residual length must match Jacobian rows"
    );

    let jtj = jacobian.t().dot(jacobian);
    let jtr = jacobian.t().dot(residuals);

    (
        Matrix2::new(jtj[[0, 0]], jtj[[0, 1]], jtj[[1, 0]], jtj[[1, 1]]),
        Vector2::new(jtr[0], jtr[1]),
    )
}

/// Whether the columns of $J$ are (numerically) linearly dependent.
///
/// Scale-free: $\det(J^T J)/(a_{00} a_{11}) = 1 - r^2$ where $r$ is the
/// cosine between the two Jacobian columns.
pub fn is_singular(jtj: &Matrix2<f64>) -> bool {
    let a = jtj[(0, 0)];
    let d = jtj[(1, 1)];
    if !(a > 0.0 && d > 0.0) || !a.is_finite() || !d.is_finite() {
        return true;
    }
    jtj.determinant() <= SINGULAR_RATIO * a * d
}

/// Solve the Marquardt-damped system for the step $\delta$:
///
/// $(J^T J + \lambda\,\mathrm{diag}(J^T J))\,\delta = -J^T r$
///
/// Returns `None` when the damped matrix cannot be inverted.
pub fn damped_step(jtj: &Matrix2<f64>, gradient: &Vector2<f64>, lambda: f64) -> Option<Vector2<f64>> {
    let mut damped = *jtj;
    for i in 0..2 {
        // Floor the scaling so a flat direction still receives damping.
        let scale = jtj[(i, i)].max(f64::MIN_POSITIVE.sqrt());
        damped[(i, i)] += lambda * scale;
    }
    let step = damped.lu().solve(&(-*gradient))?;
    if step.iter().all(|s| s.is_finite()) {
        Some(step)
    } else {
        None
    }
}

/// Drop the parameters not marked `free` from the system.
///
/// Pinned rows and columns are replaced by the identity with a zero
/// gradient, so [`damped_step`] returns an exactly zero step for them and
/// solves $(a_{jj}(1 + \lambda))\,\delta_j = -g_j$ for a single free one.
pub fn restrict(
    jtj: &Matrix2<f64>,
    gradient: &Vector2<f64>,
    free: [bool; 2],
) -> (Matrix2<f64>, Vector2<f64>) {
    let mut reduced = *jtj;
    let mut g = *gradient;
    for k in 0..2 {
        if free[k] {
            continue;
        }
        for j in 0..2 {
            reduced[(k, j)] = 0.0;
            reduced[(j, k)] = 0.0;
        }
        reduced[(k, k)] = 1.0;
        g[k] = 0.0;
    }
    (reduced, g)
}

/// Invert $J^T J$ for the parameter covariance.
pub fn invert_normal(jtj: &Matrix2<f64>) -> Option<Matrix2<f64>> {
    if is_singular(jtj) {
        return None;
    }
    (*jtj).try_inverse()
}
