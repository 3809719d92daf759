//! Batch-culture simulation.
//!
//! Builds the ODE system from kinetic parameters and a product set,
//! integrates it onto a fixed output grid and re-attaches product keys to
//! their state indices.

use tracing::debug;

use crate::domain::{
    KineticParameters, ProductSet, ProductTrajectory, SimulationConfig, SimulationResult,
};
use crate::error::KineticsError;
use crate::models::{BIOMASS, CultureModel, PRODUCT_OFFSET, SUBSTRATE, specific_growth_rate};
use crate::solver::{SolverOptions, integrate};

/// Simulate with the default solver settings.
pub fn simulate(
    duration: f64,
    initial_biomass: f64,
    initial_substrate: f64,
    params: &KineticParameters,
    products: &ProductSet,
) -> Result<SimulationResult, KineticsError> {
    simulate_with(
        duration,
        initial_biomass,
        initial_substrate,
        params,
        products,
        &SolverOptions::default(),
    )
}

/// Simulate a batch culture over `[0, duration]`.
///
/// Fails closed: a diverged integration returns `SimulationDiverged` and no
/// trajectory.
pub fn simulate_with(
    duration: f64,
    initial_biomass: f64,
    initial_substrate: f64,
    params: &KineticParameters,
    products: &ProductSet,
    opts: &SolverOptions,
) -> Result<SimulationResult, KineticsError> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(KineticsError::InvalidParameter(format!(
            "duration must be > 0, got {duration}"
        )));
    }
    for (name, value) in [
        ("initial biomass", initial_biomass),
        ("initial substrate", initial_substrate),
    ] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(KineticsError::InvalidParameter(format!(
                "{name} must be >= 0, got {value}"
            )));
        }
    }
    params.validate()?;

    let model = CultureModel::new(*params, products);
    let y0 = model.initial_state(initial_biomass, initial_substrate);
    let solution = integrate(&model, &y0, duration, opts)?;

    let biomass: Vec<f64> = solution.states.iter().map(|y| y[BIOMASS]).collect();
    let substrate: Vec<f64> = solution
        .states
        .iter()
        .map(|y| y[SUBSTRATE].max(0.0))
        .collect();
    let growth_rate: Vec<f64> = substrate
        .iter()
        .map(|&s| specific_growth_rate(params, s))
        .collect();
    let products: Vec<ProductTrajectory> = products
        .iter()
        .enumerate()
        .map(|(i, spec)| ProductTrajectory {
            key: spec.key.clone(),
            values: solution
                .states
                .iter()
                .map(|y| y[PRODUCT_OFFSET + i])
                .collect(),
        })
        .collect();

    debug!(
        points = solution.time.len(),
        products = products.len(),
        final_biomass = biomass.last().copied().unwrap_or_default(),
        "simulation complete"
    );

    Ok(SimulationResult {
        time: solution.time,
        biomass,
        substrate,
        growth_rate,
        products,
        stats: solution.stats,
    })
}

/// Simulate a stored configuration.
pub fn simulate_config(
    config: &SimulationConfig,
    opts: &SolverOptions,
) -> Result<SimulationResult, KineticsError> {
    simulate_with(
        config.duration,
        config.initial_biomass,
        config.initial_substrate,
        &config.params,
        &config.products,
        opts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Method, ProductSpec};

    fn params() -> KineticParameters {
        KineticParameters {
            mu_max: 0.347,
            ks: 21.1,
            yxs: 0.13,
            ms: 0.01,
        }
    }

    #[test]
    fn unlimited_substrate_gives_exponential_growth() {
        // Ks tiny relative to S: µ ≈ µmax for the whole run.
        let p = KineticParameters {
            mu_max: 0.2,
            ks: 1e-9,
            yxs: 1.0,
            ms: 0.0,
        };
        let products = ProductSet::try_from(vec![ProductSpec::new("P", 0.0, 0.5, 0.0)]).unwrap();
        let r = simulate(5.0, 0.1, 1e6, &p, &products).unwrap();
        let t_end = *r.time.last().unwrap();
        let x_end = *r.biomass.last().unwrap();
        assert!((x_end - 0.1 * (0.2 * t_end).exp()).abs() < 1e-5);

        // dP/dt = 0.5 X, P(0) = 0 ⇒ P = 0.5·X0·(e^{µt} − 1)/µ.
        let p_end = *r.product("P").unwrap().last().unwrap();
        let exact = 0.5 * 0.1 * ((0.2 * t_end).exp() - 1.0) / 0.2;
        assert!((p_end - exact).abs() < 1e-5);
    }

    #[test]
    fn growth_rate_track_matches_substrate() {
        let r = simulate(10.0, 0.2, 50.0, &params(), &ProductSet::new()).unwrap();
        assert_eq!(r.growth_rate.len(), r.len());
        for (mu, s) in r.growth_rate.iter().zip(&r.substrate) {
            assert_eq!(*mu, specific_growth_rate(&params(), *s));
        }
    }

    #[test]
    fn product_columns_follow_set_order() {
        // Inert products keep their initial values, so each column is identifiable.
        let products = ProductSet::try_from(vec![
            ProductSpec::new("5CG", 0.0, 0.0, 3.0),
            ProductSpec::new("AG", 0.0, 0.0, 1.0),
            ProductSpec::new("2CG", 0.0, 0.0, 2.0),
        ])
        .unwrap();
        let r = simulate(6.0, 0.2, 50.0, &params(), &products).unwrap();
        let keys: Vec<&str> = r.products.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, ["5CG", "AG", "2CG"]);
        for (p, expected) in r.products.iter().zip([3.0, 1.0, 2.0]) {
            assert_eq!(p.values.len(), r.len());
            assert!(p.values.iter().all(|&v| v == expected), "{}", p.key);
        }
    }

    #[test]
    fn schemes_agree_on_batch_culture() {
        let opts = |method| SolverOptions {
            method,
            output_points: 97,
            ..SolverOptions::default()
        };
        let none = ProductSet::new();
        let a = simulate_with(24.0, 0.2, 50.0, &params(), &none, &opts(Method::DormandPrince))
            .unwrap();
        let b =
            simulate_with(24.0, 0.2, 50.0, &params(), &none, &opts(Method::Rosenbrock)).unwrap();
        let xa = *a.biomass.last().unwrap();
        let xb = *b.biomass.last().unwrap();
        assert!((xa - xb).abs() / xa < 1e-3, "{xa} vs {xb}");
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let none = ProductSet::new();
        assert!(matches!(
            simulate(0.0, 0.2, 50.0, &params(), &none),
            Err(KineticsError::InvalidParameter(_))
        ));
        assert!(matches!(
            simulate(10.0, -0.2, 50.0, &params(), &none),
            Err(KineticsError::InvalidParameter(_))
        ));
        let bad = KineticParameters { ks: 0.0, ..params() };
        assert!(simulate(10.0, 0.2, 50.0, &bad, &none).is_err());
    }

    #[test]
    fn config_round_trips_through_simulate_config() {
        let config = SimulationConfig {
            duration: 12.0,
            initial_biomass: 0.2,
            initial_substrate: 30.0,
            params: params(),
            products: ProductSet::new(),
        };
        let a = simulate_config(&config, &SolverOptions::default()).unwrap();
        let b = simulate(12.0, 0.2, 30.0, &params(), &ProductSet::new()).unwrap();
        assert_eq!(a, b);
    }
}
