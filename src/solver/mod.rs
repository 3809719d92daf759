//! Adaptive integration of initial-value problems onto a fixed output grid.
//!
//! Responsibilities:
//!
//! - step-size control with embedded error estimates (`dopri`, `rosenbrock`)
//! - explicit → implicit switching once stiffness is detected (`Method::Auto`)
//! - landing exactly on every output time (steps are clipped, no interpolation)
//! - failing closed: any divergence returns an error and no trajectory
//!
//! Step floor policy: a step that fails the error test while already at
//! `h_min` is accepted and counted in `SolverStats::floor_steps`. This lets
//! the integrator walk through kinks in the right-hand side (substrate
//! exhaustion) without aborting. Non-finite states, singular iteration
//! matrices at the floor and an exhausted step budget are divergence.

pub mod dopri;
pub mod rosenbrock;

use tracing::{debug, info, warn};

use crate::domain::{Method, SolverStats};
use crate::error::KineticsError;
use crate::solver::dopri::DormandPrince;
use crate::solver::rosenbrock::Rosenbrock;

/// A first-order system `dy/dt = f(t, y)` with a fixed state dimension.
pub trait OdeSystem {
    fn dim(&self) -> usize;

    /// Write `f(t, y)` into `dydt` (same length as `y`).
    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]);
}

/// Integration settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub method: Method,
    pub rtol: f64,
    pub atol: f64,
    /// Smallest internal step. Steps at this size are accepted even when the
    /// error test fails.
    pub h_min: f64,
    /// Largest internal step (`None` = the whole horizon).
    pub h_max: Option<f64>,
    /// Accepted + rejected step budget.
    pub max_steps: usize,
    /// Number of equally spaced output times, endpoints included.
    pub output_points: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: Method::Auto,
            rtol: 1e-6,
            atol: 1e-9,
            h_min: 1e-3,
            h_max: None,
            max_steps: 500_000,
            output_points: 1000,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<(), KineticsError> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(KineticsError::InvalidParameter(format!(
                "rtol must be > 0, got {}",
                self.rtol
            )));
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(KineticsError::InvalidParameter(format!(
                "atol must be > 0, got {}",
                self.atol
            )));
        }
        if !(self.h_min.is_finite() && self.h_min >= 0.0) {
            return Err(KineticsError::InvalidParameter(format!(
                "h_min must be >= 0, got {}",
                self.h_min
            )));
        }
        if let Some(h_max) = self.h_max {
            if !(h_max.is_finite() && h_max > 0.0 && h_max >= self.h_min) {
                return Err(KineticsError::InvalidParameter(format!(
                    "h_max must be > 0 and >= h_min, got {h_max}"
                )));
            }
        }
        if self.output_points < 2 {
            return Err(KineticsError::InvalidParameter(
                "output_points must be >= 2".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(KineticsError::InvalidParameter(
                "max_steps must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// States sampled on the output grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub time: Vec<f64>,
    /// `states[k]` is the state at `time[k]`.
    pub states: Vec<Vec<f64>>,
    pub stats: SolverStats,
}

/// Candidate produced by one step attempt.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub y_new: Vec<f64>,
    /// Scaled RMS error; `<= 1` passes the error test.
    pub error: f64,
    pub rhs_evaluations: usize,
    pub jacobian_evaluations: usize,
}

/// Scaled RMS norm of a local error vector.
pub fn error_norm(err: &[f64], y: &[f64], y_new: &[f64], rtol: f64, atol: f64) -> f64 {
    if err.is_empty() {
        return 0.0;
    }
    let sum: f64 = err
        .iter()
        .zip(y.iter().zip(y_new))
        .map(|(&e, (&a, &b))| {
            let sc = atol + rtol * a.abs().max(b.abs());
            (e / sc) * (e / sc)
        })
        .sum();
    (sum / err.len() as f64).sqrt()
}

/// `n` equally spaced points over `[0, t_end]` with exact endpoints.
pub fn output_grid(t_end: f64, n: usize) -> Vec<f64> {
    let n = n.max(2);
    let mut out: Vec<f64> = (0..n)
        .map(|i| t_end * i as f64 / (n as f64 - 1.0))
        .collect();
    out[n - 1] = t_end;
    out
}

/// Consecutive stiff steps before `Method::Auto` switches to Rosenbrock.
const STIFF_STEPS_TO_SWITCH: usize = 15;
/// Non-stiff steps that reset the stiffness counter.
const NON_STIFF_RESET: usize = 6;

const SAFETY: f64 = 0.9;
const FAC_MIN: f64 = 0.2;
const FAC_MAX: f64 = 5.0;

enum Active {
    Explicit(DormandPrince),
    Implicit(Rosenbrock),
}

impl Active {
    fn error_order(&self) -> i32 {
        match self {
            Active::Explicit(_) => dopri::ERROR_ORDER,
            Active::Implicit(_) => rosenbrock::ERROR_ORDER,
        }
    }
}

/// Integrate `system` from `y0` at `t = 0` to `t_end`, sampling on the
/// output grid of `opts.output_points` points.
pub fn integrate<S: OdeSystem>(
    system: &S,
    y0: &[f64],
    t_end: f64,
    opts: &SolverOptions,
) -> Result<Solution, KineticsError> {
    opts.validate()?;
    if !(t_end.is_finite() && t_end > 0.0) {
        return Err(KineticsError::InvalidParameter(format!(
            "integration horizon must be > 0, got {t_end}"
        )));
    }
    let dim = system.dim();
    if y0.len() != dim {
        return Err(KineticsError::mismatch("y0", y0.len(), "system", dim));
    }
    if y0.iter().any(|v| !v.is_finite()) {
        return Err(KineticsError::InvalidParameter(
            "initial state must be finite".to_string(),
        ));
    }

    let grid = output_grid(t_end, opts.output_points);
    let h_max = opts.h_max.unwrap_or(t_end).min(t_end);
    let h_min = opts.h_min.min(h_max);

    let mut stats = SolverStats::default();
    let mut active = match opts.method {
        Method::Auto | Method::DormandPrince => Active::Explicit(DormandPrince::new(dim)),
        Method::Rosenbrock => Active::Implicit(Rosenbrock::new(dim)),
    };

    let mut t = 0.0;
    let mut y = y0.to_vec();
    let mut h = initial_step(system, &y, t_end, active.error_order(), opts, &mut stats)
        .clamp(h_min, h_max);

    let mut states = Vec::with_capacity(grid.len());
    states.push(y.clone());

    let mut last_rejected = false;
    let mut stiff_count = 0usize;
    let mut non_stiff_count = 0usize;

    for &target in &grid[1..] {
        while t < target {
            if stats.accepted_steps + stats.rejected_steps >= opts.max_steps {
                return Err(KineticsError::SimulationDiverged {
                    t,
                    reason: format!("step budget of {} exhausted", opts.max_steps),
                });
            }

            let remaining = target - t;
            let h_proposed = h.min(h_max);
            let mut h_try = h_proposed;
            let clipped = h_try >= remaining || remaining - h_try <= 1e-10 * target.abs().max(1.0);
            if clipped {
                h_try = remaining;
            }
            if h_try <= 1e-14 * t.abs().max(1.0) {
                return Err(KineticsError::SimulationDiverged {
                    t,
                    reason: "step size underflow".to_string(),
                });
            }
            // Clipping may stretch a floor step by rounding noise; it is still
            // a floor step.
            let at_floor = h_try.min(h_proposed) <= h_min;

            let attempt = match &mut active {
                Active::Explicit(dp) => Ok(dp.attempt(system, t, &y, h_try, opts.rtol, opts.atol)),
                Active::Implicit(ros) => ros.attempt(system, t, &y, h_try, opts.rtol, opts.atol),
            };

            let step = match attempt {
                Ok(step) => step,
                Err(_) if at_floor => {
                    return Err(KineticsError::SimulationDiverged {
                        t,
                        reason: "singular iteration matrix at minimum step".to_string(),
                    });
                }
                Err(_) => {
                    stats.rejected_steps += 1;
                    h = (h_try * 0.5).max(h_min);
                    last_rejected = true;
                    continue;
                }
            };
            stats.rhs_evaluations += step.rhs_evaluations;
            stats.jacobian_evaluations += step.jacobian_evaluations;

            let exponent = 1.0 / f64::from(active.error_order() + 1);

            if !step.error.is_finite() {
                if at_floor {
                    return Err(KineticsError::SimulationDiverged {
                        t,
                        reason: "non-finite error estimate at minimum step".to_string(),
                    });
                }
                stats.rejected_steps += 1;
                h = (h_try * FAC_MIN).max(h_min);
                last_rejected = true;
                continue;
            }

            if step.error > 1.0 && !at_floor {
                stats.rejected_steps += 1;
                let factor = (SAFETY * step.error.powf(-exponent)).max(FAC_MIN);
                h = (h_try * factor).max(h_min);
                last_rejected = true;
                continue;
            }

            if step.y_new.iter().any(|v| !v.is_finite()) {
                return Err(KineticsError::SimulationDiverged {
                    t,
                    reason: "state became non-finite".to_string(),
                });
            }
            if step.error > 1.0 {
                if stats.floor_steps == 0 {
                    warn!(t, h = h_try, error = step.error, "accepting step at minimum step size");
                }
                stats.floor_steps += 1;
            }

            // Stiffness must be read before `accept` recycles the last stage.
            let mut switch_now = false;
            if let (Method::Auto, Active::Explicit(dp)) = (opts.method, &active) {
                if dp.stiffness_ratio(h_try, &step.y_new) > dopri::STIFF_RATIO {
                    non_stiff_count = 0;
                    stiff_count += 1;
                    switch_now = stiff_count >= STIFF_STEPS_TO_SWITCH;
                } else {
                    non_stiff_count += 1;
                    if non_stiff_count >= NON_STIFF_RESET {
                        stiff_count = 0;
                    }
                }
            }
            if let Active::Explicit(dp) = &mut active {
                dp.accept();
            }

            t = if clipped { target } else { t + h_try };
            y = step.y_new;
            stats.accepted_steps += 1;

            let mut factor = if step.error > 0.0 {
                (SAFETY * step.error.powf(-exponent)).clamp(FAC_MIN, FAC_MAX)
            } else {
                FAC_MAX
            };
            if last_rejected {
                factor = factor.min(1.0);
            }
            last_rejected = false;
            let proposed = h_try * factor;
            // A clipped step says nothing about how large the next one may be.
            h = if clipped { h.max(proposed) } else { proposed };
            h = h.clamp(h_min, h_max);

            if switch_now {
                info!(t, "stiffness detected, switching to Rosenbrock");
                stats.stiff_switch_at = Some(t);
                active = Active::Implicit(Rosenbrock::new(dim));
                h = h.min(h_max);
            }
        }
        states.push(y.clone());
    }

    debug!(
        accepted = stats.accepted_steps,
        rejected = stats.rejected_steps,
        rhs = stats.rhs_evaluations,
        floor = stats.floor_steps,
        "integration finished"
    );

    Ok(Solution {
        time: grid,
        states,
        stats,
    })
}

/// Starting step from the size of the solution and its first two derivatives.
fn initial_step<S: OdeSystem>(
    system: &S,
    y0: &[f64],
    t_end: f64,
    error_order: i32,
    opts: &SolverOptions,
    stats: &mut SolverStats,
) -> f64 {
    let n = y0.len();
    let mut f0 = vec![0.0; n];
    system.rhs(0.0, y0, &mut f0);

    let scale: Vec<f64> = y0.iter().map(|v| opts.atol + opts.rtol * v.abs()).collect();
    let rms = |v: &[f64]| -> f64 {
        let s: f64 = v.iter().zip(&scale).map(|(a, sc)| (a / sc) * (a / sc)).sum();
        (s / n.max(1) as f64).sqrt()
    };

    let d0 = rms(y0);
    let d1 = rms(&f0);
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    }
    .min(t_end);

    let y1: Vec<f64> = y0.iter().zip(&f0).map(|(y, f)| y + h0 * f).collect();
    let mut f1 = vec![0.0; n];
    system.rhs(h0, &y1, &mut f1);
    stats.rhs_evaluations += 2;

    let diff: Vec<f64> = f1.iter().zip(&f0).map(|(a, b)| a - b).collect();
    let d2 = rms(&diff) / h0;

    let h1 = if d1.max(d2) <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / f64::from(error_order + 1))
    };
    let h = (100.0 * h0).min(h1);
    if h.is_finite() && h > 0.0 { h } else { 1e-6 }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay {
        rate: f64,
    }

    impl OdeSystem for Decay {
        fn dim(&self) -> usize {
            1
        }

        fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
            dydt[0] = -self.rate * y[0];
        }
    }

    /// Harmonic oscillator: y0'' = -y0.
    struct Oscillator;

    impl OdeSystem for Oscillator {
        fn dim(&self) -> usize {
            2
        }

        fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
            dydt[0] = y[1];
            dydt[1] = -y[0];
        }
    }

    struct Blowup;

    impl OdeSystem for Blowup {
        fn dim(&self) -> usize {
            1
        }

        fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
            dydt[0] = y[0] * y[0];
        }
    }

    fn opts(method: Method) -> SolverOptions {
        SolverOptions {
            method,
            h_min: 0.0,
            output_points: 11,
            ..SolverOptions::default()
        }
    }

    #[test]
    fn grid_has_exact_endpoints() {
        let g = output_grid(48.0, 1000);
        assert_eq!(g.len(), 1000);
        assert_eq!(g[0], 0.0);
        assert_eq!(g[999], 48.0);
        assert!(g.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn dopri_matches_exponential_decay() {
        let sol =
            integrate(&Decay { rate: 0.7 }, &[2.0], 5.0, &opts(Method::DormandPrince)).unwrap();
        for (t, y) in sol.time.iter().zip(&sol.states) {
            let exact = 2.0 * (-0.7 * t).exp();
            assert!((y[0] - exact).abs() <= 1e-5 * exact.abs() + 1e-8, "t={t}");
        }
        assert_eq!(sol.stats.stiff_switch_at, None);
    }

    #[test]
    fn rosenbrock_matches_oscillator() {
        let sol = integrate(&Oscillator, &[1.0, 0.0], 3.0, &opts(Method::Rosenbrock)).unwrap();
        let last = sol.states.last().unwrap();
        assert!((last[0] - 3.0f64.cos()).abs() < 1e-4);
        assert!((last[1] + 3.0f64.sin()).abs() < 1e-4);
        assert!(sol.stats.jacobian_evaluations > 0);
    }

    #[test]
    fn auto_switches_on_stiff_problem() {
        let sol = integrate(
            &Decay { rate: 5000.0 },
            &[1.0],
            10.0,
            &SolverOptions {
                output_points: 3,
                ..opts(Method::Auto)
            },
        )
        .unwrap();
        assert!(sol.stats.stiff_switch_at.is_some());
        assert!(sol.states.last().unwrap()[0].abs() < 1e-6);
    }

    #[test]
    fn floor_step_stretched_to_grid_point_is_accepted() {
        // Grid spacing lands a hair above h_min; the error test fails there.
        let sol = integrate(
            &Decay { rate: 1000.0 },
            &[1.0],
            0.999,
            &SolverOptions {
                method: Method::DormandPrince,
                max_steps: 50_000,
                ..SolverOptions::default()
            },
        )
        .unwrap();
        assert_eq!(sol.time.len(), 1000);
        assert!(sol.stats.floor_steps > 0);
        assert!(sol.stats.accepted_steps < 2000, "{:?}", sol.stats);
        assert!(sol.states.last().unwrap()[0].abs() < 1e-6);
    }

    #[test]
    fn finite_time_blowup_fails_closed() {
        // y' = y², y(0) = 1 blows up at t = 1.
        let err = integrate(&Blowup, &[1.0], 2.0, &opts(Method::DormandPrince)).unwrap_err();
        assert!(matches!(err, KineticsError::SimulationDiverged { .. }));
    }

    #[test]
    fn step_budget_is_enforced() {
        let err = integrate(
            &Oscillator,
            &[1.0, 0.0],
            100.0,
            &SolverOptions {
                max_steps: 5,
                ..opts(Method::DormandPrince)
            },
        )
        .unwrap_err();
        assert!(matches!(err, KineticsError::SimulationDiverged { .. }));
    }

    #[test]
    fn invalid_options_are_rejected() {
        let bad = SolverOptions {
            output_points: 1,
            ..SolverOptions::default()
        };
        assert!(matches!(
            integrate(&Oscillator, &[1.0, 0.0], 1.0, &bad),
            Err(KineticsError::InvalidParameter(_))
        ));
    }
}
