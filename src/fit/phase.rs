//! Exponential-phase detection on log-biomass.
//!
//! During balanced exponential growth `X(t) = X0·e^{µt}`, so `ln X` is linear
//! in time with slope µ. We scan every window produced by
//! [`windows`](crate::fit::window::windows), fit `ln(X + ε)` vs `t` by OLS and
//! keep the best window such that:
//!
//! - the slope is positive (growth, not decline)
//! - `R² > 0.90`
//! - its R² is strictly higher than every window seen before it
//!
//! The strict comparison means ties keep the first window in search order
//! (shorter windows first, then earlier starts).
//!
//! Cost is O(n³) in the number of samples: O(n) lengths × O(n) starts × O(n)
//! per regression. That is fine for laboratory series (tens of points) but
//! should not be pointed at long sensor logs without a `max_window` cap.

use tracing::debug;

use crate::domain::{ExponentialPhaseResult, PhaseSearch, RegressionResult};
use crate::error::KineticsError;
use crate::fit::window::{Window, windows};
use crate::math::fit_line;

/// Minimum R² for a window to count as exponential growth.
pub const R2_THRESHOLD: f64 = 0.90;

/// Offset added before taking logs so zero biomass stays finite.
pub const LOG_EPSILON: f64 = 1e-10;

/// Fewest samples for which a search is attempted.
pub const MIN_SAMPLES: usize = 4;

/// `ln(x + ε)` for every biomass sample.
pub fn log_biomass(biomass: &[f64]) -> Vec<f64> {
    biomass.iter().map(|&x| (x + LOG_EPSILON).ln()).collect()
}

/// Detect the exponential phase with the default search bounds.
pub fn detect_exponential_phase(
    time: &[f64],
    biomass: &[f64],
) -> Result<ExponentialPhaseResult, KineticsError> {
    detect_exponential_phase_with(time, biomass, &PhaseSearch::default())
}

/// Detect the exponential phase with caller-supplied search bounds.
///
/// Returns `detected = false` (not an error) when the series has fewer than
/// four points or no window qualifies.
pub fn detect_exponential_phase_with(
    time: &[f64],
    biomass: &[f64],
    search: &PhaseSearch,
) -> Result<ExponentialPhaseResult, KineticsError> {
    if time.len() != biomass.len() {
        return Err(KineticsError::mismatch(
            "time",
            time.len(),
            "biomass",
            biomass.len(),
        ));
    }
    let n = time.len();
    if n < MIN_SAMPLES {
        return Ok(ExponentialPhaseResult::insufficient());
    }

    let ln_x = log_biomass(biomass);

    let mut best: Option<(Window, RegressionResult)> = None;
    let mut visited = 0usize;
    for window in windows(n, search) {
        visited += 1;
        let range = window.range();
        // Windows whose fit is undefined (repeated time stamps) are not candidates.
        let Ok(fit) = fit_line(&time[range.clone()], &ln_x[range]) else {
            continue;
        };
        if !(fit.slope > 0.0 && fit.r_squared > R2_THRESHOLD) {
            continue;
        }
        let better = match &best {
            Some((_, b)) => fit.r_squared > b.r_squared,
            None => true,
        };
        if better {
            best = Some((window, fit));
        }
    }

    let Some((window, fit)) = best else {
        debug!(n, visited, "no exponential window found");
        return Ok(ExponentialPhaseResult::not_found(time[0], time[n - 1]));
    };

    let start_time = time[window.start];
    let end_time = time[window.last()];
    debug!(
        n,
        visited,
        start = window.start,
        len = window.len,
        mu = fit.slope,
        r2 = fit.r_squared,
        "exponential window selected"
    );

    Ok(ExponentialPhaseResult {
        detected: true,
        start_time,
        end_time,
        duration: end_time - start_time,
        growth_rate: fit.slope,
        r_squared: fit.r_squared,
    })
}

/// Fit the growth rate over a user-chosen inclusive index range.
///
/// No R² threshold applies; the caller has already decided this is the
/// exponential phase.
pub fn fit_growth_window(
    time: &[f64],
    biomass: &[f64],
    start: usize,
    end: usize,
) -> Result<ExponentialPhaseResult, KineticsError> {
    if time.len() != biomass.len() {
        return Err(KineticsError::mismatch(
            "time",
            time.len(),
            "biomass",
            biomass.len(),
        ));
    }
    if !(start < end && end < time.len()) {
        return Err(KineticsError::InvalidParameter(format!(
            "window {start}..={end} is not a valid range for {} samples",
            time.len()
        )));
    }

    let ln_x = log_biomass(&biomass[start..=end]);
    let fit = fit_line(&time[start..=end], &ln_x)?;

    Ok(ExponentialPhaseResult {
        detected: true,
        start_time: time[start],
        end_time: time[end],
        duration: time[end] - time[start],
        growth_rate: fit.slope,
        r_squared: fit.r_squared,
    })
}
