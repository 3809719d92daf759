//! Four-stage Rosenbrock method of order 4 with an embedded order-3 solution
//! (Kaps–Rentrop form, Shampine's A-stable coefficient set, as in ROS4).
//!
//! With `M = I/(γh) − J` and `T = ∂f/∂t`, each stage solves
//!
//! ```text
//! M g1 = f(t, y)                      + c1·h·T
//! M g2 = f(t + h, y + a21·g1)         + c2·h·T + (c21·g1)/h
//! M g3 = f(t + 3h/5, y + a31·g1 + a32·g2)
//!                                     + c3·h·T + (c31·g1 + c32·g2)/h
//! M g4 = (same f as stage 3)          + c4·h·T + (c41·g1 + c42·g2 + c43·g3)/h
//! y_new = y + Σ b_i·g_i,   err = Σ e_i·g_i
//! ```
//!
//! `J` and `T` are formed by forward differences every step and `M` is
//! factorized once per step with nalgebra's LU; state dimension is
//! 2 + number of products, so the dense solves are negligible next to the
//! step count.

use nalgebra::{DMatrix, DVector};

use crate::solver::{OdeSystem, StepResult, error_norm};

const GAMMA: f64 = 0.5;

const A21: f64 = 2.0;
const A31: f64 = 48.0 / 25.0;
const A32: f64 = 6.0 / 25.0;

const C21: f64 = -8.0;
const C31: f64 = 372.0 / 25.0;
const C32: f64 = 12.0 / 5.0;
const C41: f64 = -112.0 / 125.0;
const C42: f64 = -54.0 / 125.0;
const C43: f64 = -2.0 / 5.0;

const B1: f64 = 19.0 / 9.0;
const B2: f64 = 1.0 / 2.0;
const B3: f64 = 25.0 / 108.0;
const B4: f64 = 125.0 / 108.0;

// 4th minus embedded 3rd order weights; e3 is zero.
const E1: f64 = 17.0 / 54.0;
const E2: f64 = 7.0 / 36.0;
const E4: f64 = 125.0 / 108.0;

// Time-derivative weights and stage abscissae.
const CT1: f64 = 1.0 / 2.0;
const CT2: f64 = -3.0 / 2.0;
const CT3: f64 = 121.0 / 50.0;
const CT4: f64 = 29.0 / 250.0;
const X2: f64 = 1.0;
const X3: f64 = 3.0 / 5.0;

/// Lower order of the embedded pair; the controller exponent is `1/(q+1)`.
pub const ERROR_ORDER: i32 = 3;

/// `M` could not be factorized for the attempted step size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingularMatrix;

#[derive(Debug, Clone)]
pub struct Rosenbrock {
    f0: Vec<f64>,
    dfdt: Vec<f64>,
    scratch: Vec<f64>,
    stage: Vec<f64>,
}

impl Rosenbrock {
    pub fn new(dim: usize) -> Self {
        Self {
            f0: vec![0.0; dim],
            dfdt: vec![0.0; dim],
            scratch: vec![0.0; dim],
            stage: vec![0.0; dim],
        }
    }

    pub fn attempt<S: OdeSystem>(
        &mut self,
        system: &S,
        t: f64,
        y: &[f64],
        h: f64,
        rtol: f64,
        atol: f64,
    ) -> Result<StepResult, SingularMatrix> {
        let n = y.len();
        system.rhs(t, y, &mut self.f0);
        let jac = self.jacobian(system, t, y);
        self.time_derivative(system, t, y);

        let diag = 1.0 / (GAMMA * h);
        let m = DMatrix::from_fn(n, n, |i, j| {
            let identity = if i == j { diag } else { 0.0 };
            identity - jac[(i, j)]
        });
        let lu = m.lu();
        let dfdt = &self.dfdt;

        let g1 = lu
            .solve(&DVector::from_fn(n, |i, _| self.f0[i] + h * CT1 * dfdt[i]))
            .ok_or(SingularMatrix)?;

        for i in 0..n {
            self.stage[i] = y[i] + A21 * g1[i];
        }
        system.rhs(t + X2 * h, &self.stage, &mut self.scratch);
        let g2 = lu
            .solve(&DVector::from_fn(n, |i, _| {
                self.scratch[i] + h * CT2 * dfdt[i] + C21 * g1[i] / h
            }))
            .ok_or(SingularMatrix)?;

        for i in 0..n {
            self.stage[i] = y[i] + A31 * g1[i] + A32 * g2[i];
        }
        system.rhs(t + X3 * h, &self.stage, &mut self.scratch);
        let g3 = lu
            .solve(&DVector::from_fn(n, |i, _| {
                self.scratch[i] + h * CT3 * dfdt[i] + (C31 * g1[i] + C32 * g2[i]) / h
            }))
            .ok_or(SingularMatrix)?;
        let g4 = lu
            .solve(&DVector::from_fn(n, |i, _| {
                self.scratch[i] + h * CT4 * dfdt[i] + (C41 * g1[i] + C42 * g2[i] + C43 * g3[i]) / h
            }))
            .ok_or(SingularMatrix)?;

        let y_new: Vec<f64> = (0..n)
            .map(|i| y[i] + B1 * g1[i] + B2 * g2[i] + B3 * g3[i] + B4 * g4[i])
            .collect();
        let err: Vec<f64> = (0..n).map(|i| E1 * g1[i] + E2 * g2[i] + E4 * g4[i]).collect();
        let error = error_norm(&err, y, &y_new, rtol, atol);

        Ok(StepResult {
            y_new,
            error,
            rhs_evaluations: 4 + n,
            jacobian_evaluations: 1,
        })
    }

    /// Forward-difference Jacobian `∂f_i/∂y_j` at `(t, y)`, reusing `f0`.
    fn jacobian<S: OdeSystem>(&mut self, system: &S, t: f64, y: &[f64]) -> DMatrix<f64> {
        let n = y.len();
        let sqrt_eps = f64::EPSILON.sqrt();
        let mut jac = DMatrix::zeros(n, n);
        self.stage.copy_from_slice(y);
        for j in 0..n {
            let delta = sqrt_eps * y[j].abs().max(1.0);
            self.stage[j] = y[j] + delta;
            system.rhs(t, &self.stage, &mut self.scratch);
            for i in 0..n {
                jac[(i, j)] = (self.scratch[i] - self.f0[i]) / delta;
            }
            self.stage[j] = y[j];
        }
        jac
    }

    /// Forward-difference `∂f/∂t` into `dfdt`; zero for autonomous systems.
    fn time_derivative<S: OdeSystem>(&mut self, system: &S, t: f64, y: &[f64]) {
        let delta = f64::EPSILON.sqrt() * t.abs().max(1.0);
        system.rhs(t + delta, y, &mut self.scratch);
        for i in 0..y.len() {
            self.dfdt[i] = (self.scratch[i] - self.f0[i]) / delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stiff;

    impl OdeSystem for Stiff {
        fn dim(&self) -> usize {
            1
        }

        fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
            dydt[0] = -1000.0 * y[0];
        }
    }

    /// `y' = -2y + sin(3t)`, exercising the time-derivative terms.
    struct Forced;

    impl OdeSystem for Forced {
        fn dim(&self) -> usize {
            1
        }

        fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]) {
            dydt[0] = -2.0 * y[0] + (3.0 * t).sin();
        }
    }

    fn forced_exact(t: f64) -> f64 {
        // y(0) = 1.
        let particular = (2.0 * (3.0 * t).sin() - 3.0 * (3.0 * t).cos()) / 13.0;
        particular + (1.0 + 3.0 / 13.0) * (-2.0 * t).exp()
    }

    #[test]
    fn large_stiff_step_stays_bounded() {
        // hλ = -1000 is far outside any explicit stability region.
        let mut ros = Rosenbrock::new(1);
        let step = ros.attempt(&Stiff, 0.0, &[1.0], 1.0, 1e-6, 1e-9).unwrap();
        assert!(step.y_new[0].abs() < 0.34, "{}", step.y_new[0]);
        assert_eq!(step.jacobian_evaluations, 1);
    }

    #[test]
    fn small_step_is_fourth_order_accurate() {
        let mut ros = Rosenbrock::new(1);
        let h = 1e-4;
        let step = ros.attempt(&Stiff, 0.0, &[1.0], h, 1e-6, 1e-9).unwrap();
        let exact = (-1000.0 * h).exp();
        assert!((step.y_new[0] - exact).abs() < 1e-6);
    }

    #[test]
    fn error_estimate_shrinks_with_step() {
        let mut ros = Rosenbrock::new(1);
        let mut errors = Vec::new();
        for h in [0.1, 0.05, 0.025] {
            let step = ros.attempt(&Forced, 0.0, &[1.0], h, 1.0, 0.0).unwrap();
            let actual = (step.y_new[0] - forced_exact(h)).abs();
            assert!(actual < 1e-4, "h={h}: {actual}");
            errors.push(step.error);
        }
        // Third-order estimate: halving h divides it by roughly 2⁴.
        assert!(errors[0] / errors[1] > 8.0, "{errors:?}");
        assert!(errors[1] / errors[2] > 8.0, "{errors:?}");
    }
}
