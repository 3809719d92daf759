//! Ordinary least squares for a single regressor.
//!
//! Both the phase detector and the kLa estimator repeatedly fit
//!
//! ```text
//! y = slope * x + intercept
//! ```
//!
//! on small windows, so we use the closed-form centered sums rather than a
//! general matrix solve:
//!
//! - `slope = Σ(x-x̄)(y-ȳ) / Σ(x-x̄)²`
//! - `intercept = ȳ - slope·x̄`
//! - `R² = 1 - SS_res/SS_tot`, with `R² = 0` when `SS_tot = 0`

use crate::domain::RegressionResult;
use crate::error::KineticsError;

/// Fit a line to `(xs[i], ys[i])`.
///
/// Errors:
/// - `DimensionMismatch` if the slices differ in length
/// - `InsufficientData` for fewer than two points
/// - `DegenerateInput` if all x values are identical
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Result<RegressionResult, KineticsError> {
    if xs.len() != ys.len() {
        return Err(KineticsError::mismatch("xs", xs.len(), "ys", ys.len()));
    }
    let n = xs.len();
    if n < 2 {
        return Err(KineticsError::InsufficientData {
            required: 2,
            found: n,
        });
    }

    let nf = n as f64;
    let x_mean = xs.iter().sum::<f64>() / nf;
    let y_mean = ys.iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    if sxx <= 0.0 {
        return Err(KineticsError::DegenerateInput(
            "zero variance in x: cannot determine a slope".to_string(),
        ));
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let r = y - (slope * x + intercept);
        ss_res += r * r;
        let d = y - y_mean;
        ss_tot += d * d;
    }
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    Ok(RegressionResult {
        slope,
        intercept,
        r_squared,
        n_points: n,
    })
}
