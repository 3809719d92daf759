//! Monod growth with Pirt maintenance and Luedeking–Piret products.
//!
//! State layout is fixed by the product set:
//!
//! - `y[0]`: biomass X
//! - `y[1]`: substrate S
//! - `y[2 + i]`: i-th product in `ProductSet` order

use crate::domain::{KineticParameters, ProductSet, ProductSpec};
use crate::solver::OdeSystem;

pub const BIOMASS: usize = 0;
pub const SUBSTRATE: usize = 1;
pub const PRODUCT_OFFSET: usize = 2;

/// Below this substrate level growth is arrested.
pub const SUBSTRATE_FLOOR: f64 = 1e-6;

/// Monod specific growth rate `µ(S)`. Negative substrate counts as zero.
pub fn specific_growth_rate(params: &KineticParameters, substrate: f64) -> f64 {
    let s = substrate.max(0.0);
    if s > SUBSTRATE_FLOOR {
        params.mu_max * s / (params.ks + s)
    } else {
        0.0
    }
}

/// Batch culture right-hand side.
#[derive(Debug, Clone)]
pub struct CultureModel<'a> {
    params: KineticParameters,
    products: &'a ProductSet,
}

impl<'a> CultureModel<'a> {
    pub fn new(params: KineticParameters, products: &'a ProductSet) -> Self {
        Self { params, products }
    }

    /// `[X0, S0, P1(0), ..., Pk(0)]`.
    pub fn initial_state(&self, initial_biomass: f64, initial_substrate: f64) -> Vec<f64> {
        let mut y = Vec::with_capacity(self.dim());
        y.push(initial_biomass);
        y.push(initial_substrate);
        y.extend(self.products.iter().map(|p| p.p0));
        y
    }
}

impl OdeSystem for CultureModel<'_> {
    fn dim(&self) -> usize {
        PRODUCT_OFFSET + self.products.len()
    }

    fn rhs(&self, _t: f64, y: &[f64], dydt: &mut [f64]) {
        let x = y[BIOMASS];
        let s = y[SUBSTRATE];
        let mu = specific_growth_rate(&self.params, s);

        let dx = mu * x;
        let qs = mu / self.params.yxs + self.params.ms;
        let mut ds = -qs * x;
        if s <= 0.0 && ds < 0.0 {
            ds = 0.0;
        }
        dydt[BIOMASS] = dx;
        dydt[SUBSTRATE] = ds;

        for (i, ProductSpec { alpha, beta, .. }) in self.products.iter().enumerate() {
            dydt[PRODUCT_OFFSET + i] = alpha * dx + beta * x;
        }
    }
}
