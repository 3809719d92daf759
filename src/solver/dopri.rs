//! Dormand–Prince 5(4) explicit Runge–Kutta step.
//!
//! Seven stages with the FSAL property: the last stage is `f(t+h, y_new)` and
//! becomes the first stage of the next step. The propagated solution is the
//! 5th-order one; the embedded 4th-order solution only drives the error
//! estimate.
//!
//! Stiffness is estimated after each step from the last two stages, which are
//! both evaluated at `t + h`:
//!
//! ```text
//! h·|λ| ≈ h · ‖k7 − k6‖ / ‖y_new − y6‖
//! ```

use crate::solver::{OdeSystem, StepResult, error_norm};

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// 5th minus embedded 4th order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

/// Lower order of the embedded pair; the controller exponent is `1/(q+1)`.
pub const ERROR_ORDER: i32 = 4;

/// Stability-boundary threshold for `h·|λ|`.
pub const STIFF_RATIO: f64 = 3.25;

/// Reusable stage storage plus the FSAL derivative.
#[derive(Debug, Clone)]
pub struct DormandPrince {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    k5: Vec<f64>,
    k6: Vec<f64>,
    k7: Vec<f64>,
    stage: Vec<f64>,
    y6: Vec<f64>,
    fsal_valid: bool,
}

impl DormandPrince {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            k5: vec![0.0; dim],
            k6: vec![0.0; dim],
            k7: vec![0.0; dim],
            stage: vec![0.0; dim],
            y6: vec![0.0; dim],
            fsal_valid: false,
        }
    }

    /// Attempt one step of size `h` from `(t, y)`.
    ///
    /// Returns the candidate state and its scaled error; nothing is committed
    /// until [`accept`](Self::accept) is called.
    pub fn attempt<S: OdeSystem>(
        &mut self,
        system: &S,
        t: f64,
        y: &[f64],
        h: f64,
        rtol: f64,
        atol: f64,
    ) -> StepResult {
        let n = y.len();
        let mut evals = 6;
        if !self.fsal_valid {
            system.rhs(t, y, &mut self.k1);
            evals += 1;
            self.fsal_valid = true;
        }

        for i in 0..n {
            self.stage[i] = y[i] + h * A21 * self.k1[i];
        }
        system.rhs(t + C2 * h, &self.stage, &mut self.k2);

        for i in 0..n {
            self.stage[i] = y[i] + h * (A31 * self.k1[i] + A32 * self.k2[i]);
        }
        system.rhs(t + C3 * h, &self.stage, &mut self.k3);

        for i in 0..n {
            self.stage[i] = y[i] + h * (A41 * self.k1[i] + A42 * self.k2[i] + A43 * self.k3[i]);
        }
        system.rhs(t + C4 * h, &self.stage, &mut self.k4);

        for i in 0..n {
            self.stage[i] = y[i]
                + h * (A51 * self.k1[i] + A52 * self.k2[i] + A53 * self.k3[i] + A54 * self.k4[i]);
        }
        system.rhs(t + C5 * h, &self.stage, &mut self.k5);

        for i in 0..n {
            self.y6[i] = y[i]
                + h * (A61 * self.k1[i]
                    + A62 * self.k2[i]
                    + A63 * self.k3[i]
                    + A64 * self.k4[i]
                    + A65 * self.k5[i]);
        }
        system.rhs(t + h, &self.y6, &mut self.k6);

        let mut y_new = vec![0.0; n];
        for i in 0..n {
            y_new[i] = y[i]
                + h * (A71 * self.k1[i]
                    + A73 * self.k3[i]
                    + A74 * self.k4[i]
                    + A75 * self.k5[i]
                    + A76 * self.k6[i]);
        }
        system.rhs(t + h, &y_new, &mut self.k7);

        let err: Vec<f64> = (0..n)
            .map(|i| {
                h * (E1 * self.k1[i]
                    + E3 * self.k3[i]
                    + E4 * self.k4[i]
                    + E5 * self.k5[i]
                    + E6 * self.k6[i]
                    + E7 * self.k7[i])
            })
            .collect();
        let error = error_norm(&err, y, &y_new, rtol, atol);

        StepResult {
            y_new,
            error,
            rhs_evaluations: evals,
            jacobian_evaluations: 0,
        }
    }

    /// Commit the last attempt: its final stage becomes the next first stage.
    pub fn accept(&mut self) {
        std::mem::swap(&mut self.k1, &mut self.k7);
    }

    /// `h·|λ|` estimate for the last attempt of size `h` ending at `y_new`.
    pub fn stiffness_ratio(&self, h: f64, y_new: &[f64]) -> f64 {
        let mut num = 0.0;
        let mut den = 0.0;
        for i in 0..y_new.len() {
            let dk = self.k7[i] - self.k6[i];
            let dy = y_new[i] - self.y6[i];
            num += dk * dk;
            den += dy * dy;
        }
        if den > 0.0 { h * (num / den).sqrt() } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl OdeSystem for Decay {
        fn dim(&self) -> usize {
            1
        }

        fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
            dydt[0] = -y[0];
        }
    }

    #[test]
    fn single_step_is_fifth_order_accurate() {
        let mut dp = DormandPrince::new(1);
        let h = 0.1;
        let step = dp.attempt(&Decay, 0.0, &[1.0], h, 1e-6, 1e-9);
        let exact = (-h).exp();
        assert!((step.y_new[0] - exact).abs() < 1e-9);
        assert!(step.error.is_finite());
        assert_eq!(step.rhs_evaluations, 7);

        dp.accept();
        let next = dp.attempt(&Decay, h, &step.y_new, h, 1e-6, 1e-9);
        assert_eq!(next.rhs_evaluations, 6);
    }

    #[test]
    fn stiffness_ratio_tracks_eigenvalue() {
        let mut dp = DormandPrince::new(1);
        let h = 0.5;
        let step = dp.attempt(&Decay, 0.0, &[1.0], h, 1e-6, 1e-9);
        let ratio = dp.stiffness_ratio(h, &step.y_new);
        assert!((ratio - h).abs() < 1e-12, "{ratio}");
    }
}
