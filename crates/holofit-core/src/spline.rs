//! Natural cubic spline through measured efficiency samples.
//!
//! Used to locate the half-maximum crossings of a measured Bragg curve
//! between scan points, where linear interpolation would bias the width
//! of sharply peaked curves.

/// A natural cubic spline interpolator for real-valued data.
///
/// Given $n$ samples $(x_i, y_i)$, constructs piecewise cubic polynomials
/// with continuous first and second derivatives and zero curvature at the
/// ends.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    /// Strictly increasing knots.
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at each knot.
    y2s: Vec<f64>,
}

impl CubicSpline {
    /// Construct a natural cubic spline.
    ///
    /// Returns `None` when the lengths differ, fewer than two points are
    /// given, a value is non-finite, or `xs` is not strictly increasing.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Option<Self> {
        if xs.len() != ys.len() || xs.len() < 2 {
            return None;
        }
        if xs.iter().chain(&ys).any(|v| !v.is_finite()) {
            return None;
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }

        let n = xs.len();
        let mut y2s = vec![0.0; n];
        let mut u = vec![0.0; n - 1];

        // Tridiagonal forward sweep
        for i in 1..n - 1 {
            let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
            let p = sig * y2s[i - 1] + 2.0;
            y2s[i] = (sig - 1.0) / p;
            u[i] = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
                - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
            u[i] = (6.0 * u[i] / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
        }

        // Back substitution
        for k in (0..n - 2).rev() {
            y2s[k + 1] = y2s[k + 1] * y2s[k + 2] + u[k + 1];
        }

        Some(Self { xs, ys, y2s })
    }

    /// Knot range `(first, last)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Evaluate the spline at `x`.
    ///
    /// Outside the knot range the boundary polynomial is extended.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.xs.len();

        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.xs[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let h = self.xs[hi] - self.xs[lo];
        let a = (self.xs[hi] - x) / h;
        let b = (x - self.xs[lo]) / h;

        a * self.ys[lo]
            + b * self.ys[hi]
            + ((a * a * a - a) * self.y2s[lo] + (b * b * b - b) * self.y2s[hi]) * h * h / 6.0
    }

    /// First point between `from` and `to` where the spline drops to
    /// `level`, walking from `from`.
    ///
    /// The walk samples `samples` equal steps and refines the bracketing
    /// step by bisection. `from` must lie above `level`.
    pub fn descend_to(&self, level: f64, from: f64, to: f64, samples: usize) -> Option<f64> {
        if self.evaluate(from) < level || samples == 0 {
            return None;
        }
        let step = (to - from) / samples as f64;
        let mut prev = from;
        for i in 1..=samples {
            let x = from + step * i as f64;
            if self.evaluate(x) < level {
                return Some(self.bisect(level, prev, x));
            }
            prev = x;
        }
        None
    }

    /// Bisect on `[above, below]` where the spline is `>= level` at
    /// `above` and `< level` at `below`.
    fn bisect(&self, level: f64, mut above: f64, mut below: f64) -> f64 {
        for _ in 0..60 {
            let mid = 0.5 * (above + below);
            if self.evaluate(mid) >= level {
                above = mid;
            } else {
                below = mid;
            }
            if (below - above).abs() <= 1e-12 * (1.0 + above.abs()) {
                break;
            }
        }
        0.5 * (above + below)
    }
}
