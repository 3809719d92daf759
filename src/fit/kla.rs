//! Dynamic-method kLa estimation.
//!
//! After re-aeration the dissolved-oxygen deficit decays exponentially:
//!
//! ```text
//! ln(C* - C_L) = -kLa · t + c
//! ```
//!
//! so kLa is minus the slope of the log-deficit vs time.

use tracing::debug;

use crate::domain::{KlaEstimate, KlaOutcome};
use crate::error::KineticsError;
use crate::math::fit_line;

/// Default saturation reading (% air saturation).
pub const DEFAULT_SATURATION: f64 = 100.0;

/// Fewest usable samples for a regression.
const MIN_VALID_POINTS: usize = 3;

/// Estimate kLa from a DO time course.
///
/// Samples outside `0 < DO < saturation` are dropped. Too few usable samples
/// (or a degenerate regression) is reported as `KlaOutcome::Failed`; only
/// malformed input (length mismatch, invalid saturation) is an error.
pub fn estimate_kla(
    time: &[f64],
    dissolved_oxygen: &[f64],
    saturation: f64,
) -> Result<KlaOutcome, KineticsError> {
    if time.len() != dissolved_oxygen.len() {
        return Err(KineticsError::mismatch(
            "time",
            time.len(),
            "dissolved_oxygen",
            dissolved_oxygen.len(),
        ));
    }
    if !(saturation.is_finite() && saturation > 0.0) {
        return Err(KineticsError::InvalidParameter(format!(
            "saturation must be finite and > 0, got {saturation}"
        )));
    }

    let (times, log_deficit): (Vec<f64>, Vec<f64>) = time
        .iter()
        .zip(dissolved_oxygen)
        .filter(|&(_, &c)| c > 0.0 && c < saturation)
        .map(|(&t, &c)| (t, (saturation - c).ln()))
        .unzip();

    if times.len() < MIN_VALID_POINTS {
        return Ok(KlaOutcome::Failed {
            reason: format!(
                "only {} samples with 0 < DO < {saturation}; need at least {MIN_VALID_POINTS}",
                times.len()
            ),
        });
    }

    let fit = match fit_line(&times, &log_deficit) {
        Ok(fit) => fit,
        Err(KineticsError::DegenerateInput(reason)) => return Ok(KlaOutcome::Failed { reason }),
        Err(e) => return Err(e),
    };

    let predicted = times.iter().map(|&t| fit.predict(t)).collect();
    debug!(
        n = times.len(),
        kla = -fit.slope,
        r2 = fit.r_squared,
        "kLa estimated"
    );

    Ok(KlaOutcome::Estimated(KlaEstimate {
        kla: -fit.slope,
        r_squared: fit.r_squared,
        slope: fit.slope,
        intercept: fit.intercept,
        times,
        log_deficit,
        predicted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_known_kla() {
        let kla = 0.12;
        let time: Vec<f64> = (0..12).map(|i| i as f64 * 5.0).collect();
        let dox: Vec<f64> = time.iter().map(|t| 100.0 - 90.0 * (-kla * t).exp()).collect();
        let out = estimate_kla(&time, &dox, DEFAULT_SATURATION).unwrap();
        let est = out.estimate().unwrap();
        assert!((est.kla - kla).abs() < 1e-9);
        assert!((est.r_squared - 1.0).abs() < 1e-9);
        assert_eq!(est.times.len(), 12);
        assert_eq!(est.predicted.len(), 12);
    }

    #[test]
    fn saturated_and_zero_samples_are_filtered() {
        let time = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let dox = [0.0, 20.0, 40.0, 55.0, 100.0, 101.0];
        let out = estimate_kla(&time, &dox, 100.0).unwrap();
        let est = out.estimate().unwrap();
        assert_eq!(est.times, vec![1.0, 2.0, 3.0]);
        assert!(est.kla > 0.0);
    }

    #[test]
    fn too_few_valid_points_is_reported() {
        let out = estimate_kla(&[0.0, 1.0, 2.0, 3.0], &[100.0, 100.0, 50.0, 60.0], 100.0).unwrap();
        assert!(!out.is_success());
        match out {
            KlaOutcome::Failed { reason } => assert!(reason.contains("only 2")),
            KlaOutcome::Estimated(_) => unreachable!(),
        }
    }

    #[test]
    fn repeated_times_are_reported_not_raised() {
        let out = estimate_kla(&[1.0, 1.0, 1.0], &[10.0, 20.0, 30.0], 100.0).unwrap();
        assert!(!out.is_success());
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(estimate_kla(&[0.0, 1.0], &[10.0], 100.0).is_err());
        assert!(estimate_kla(&[0.0], &[10.0], 0.0).is_err());
    }
}
