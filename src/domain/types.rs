//! Shared domain types.
//!
//! Everything here is created fresh per call from caller-supplied inputs and
//! is serializable so results can be:
//!
//! - used in-memory by the CLI and tests
//! - exported to JSON/CSV
//! - reloaded later for plotting

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KineticsError;

/// Parallel measurement series sharing one time axis.
///
/// The equal-length and strictly-increasing-time invariants are checked by
/// ingest (`validate`); the numerical functions take plain slices and only
/// check what they need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Measurements {
    pub label: String,
    pub time: Vec<f64>,
    pub biomass: Vec<f64>,
    pub substrate: Vec<f64>,
    pub product: Vec<f64>,
}

impl Measurements {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Check equal lengths, non-empty series and strictly increasing time.
    pub fn validate(&self) -> Result<(), KineticsError> {
        let n = self.time.len();
        for (name, len) in [
            ("biomass", self.biomass.len()),
            ("substrate", self.substrate.len()),
            ("product", self.product.len()),
        ] {
            if len != n {
                return Err(KineticsError::mismatch("time", n, name, len));
            }
        }
        if n == 0 {
            return Err(KineticsError::InsufficientData {
                required: 1,
                found: 0,
            });
        }
        if self.time.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(KineticsError::InvalidParameter(
                "time values must be finite and >= 0".to_string(),
            ));
        }
        if let Some(w) = self.time.windows(2).find(|w| w[1] <= w[0]) {
            return Err(KineticsError::InvalidParameter(format!(
                "time must be strictly increasing (found {} after {})",
                w[1], w[0]
            )));
        }
        Ok(())
    }
}

/// Ordinary least-squares line fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination. Defined as 0 when all y values are equal.
    pub r_squared: f64,
    pub n_points: usize,
}

impl RegressionResult {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Outcome of exponential-phase detection.
///
/// `detected = false` still carries usable bounds (zeros for "not enough
/// data", the full series span for "no phase found").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialPhaseResult {
    pub detected: bool,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Specific growth rate (h⁻¹), the slope of ln(X) vs t.
    pub growth_rate: f64,
    pub r_squared: f64,
}

impl ExponentialPhaseResult {
    /// Result for series too short to search.
    pub fn insufficient() -> Self {
        Self {
            detected: false,
            start_time: 0.0,
            end_time: 0.0,
            duration: 0.0,
            growth_rate: 0.0,
            r_squared: 0.0,
        }
    }

    /// Result for a searchable series with no qualifying window.
    pub fn not_found(start_time: f64, end_time: f64) -> Self {
        Self {
            detected: false,
            start_time,
            end_time,
            duration: 0.0,
            growth_rate: 0.0,
            r_squared: 0.0,
        }
    }

    /// `ln 2 / µ`, or `None` when there is no growth.
    pub fn doubling_time(&self) -> Option<f64> {
        (self.growth_rate > 0.0).then(|| std::f64::consts::LN_2 / self.growth_rate)
    }

    /// True if `t` lies inside a detected window (inclusive).
    pub fn contains(&self, t: f64) -> bool {
        self.detected && self.start_time <= t && t <= self.end_time
    }
}

/// Bounds on the exhaustive window search.
///
/// The defaults reproduce the standard search; `max_window` lets batch
/// callers cap the O(n³) cost on long series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSearch {
    pub min_window: usize,
    /// Optional upper cap on window length (never raises the computed maximum).
    pub max_window: Option<usize>,
}

impl Default for PhaseSearch {
    fn default() -> Self {
        Self {
            min_window: 3,
            max_window: None,
        }
    }
}

/// Monod / Pirt kinetic constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KineticParameters {
    /// Maximum specific growth rate (h⁻¹).
    pub mu_max: f64,
    /// Half-saturation constant (g/L).
    pub ks: f64,
    /// Biomass yield on substrate (g X / g S).
    pub yxs: f64,
    /// Maintenance coefficient (g S / g X / h).
    pub ms: f64,
}

impl KineticParameters {
    pub fn validate(&self) -> Result<(), KineticsError> {
        let checks = [
            ("mu_max", self.mu_max, self.mu_max > 0.0),
            ("Ks", self.ks, self.ks > 0.0),
            ("Yxs", self.yxs, self.yxs > 0.0),
            ("ms", self.ms, self.ms >= 0.0),
        ];
        for (name, value, ok) in checks {
            if !(value.is_finite() && ok) {
                return Err(KineticsError::InvalidParameter(format!(
                    "{name}={value} is out of range"
                )));
            }
        }
        Ok(())
    }
}

/// Luedeking-Piret constants for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub key: String,
    /// Growth-associated yield coefficient.
    pub alpha: f64,
    /// Non-growth-associated rate.
    pub beta: f64,
    /// Initial concentration.
    pub p0: f64,
}

impl ProductSpec {
    pub fn new(key: impl Into<String>, alpha: f64, beta: f64, p0: f64) -> Self {
        Self {
            key: key.into(),
            alpha,
            beta,
            p0,
        }
    }
}

/// Insertion-ordered product mapping with unique keys.
///
/// Order fixes the state-vector layout (`2 + i` for the i-th product) and
/// the output column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ProductSpec>", into = "Vec<ProductSpec>")]
pub struct ProductSet {
    specs: Vec<ProductSpec>,
}

impl ProductSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a product. Keys must be unique and constants finite, `p0 >= 0`.
    pub fn insert(&mut self, spec: ProductSpec) -> Result<(), KineticsError> {
        if spec.key.trim().is_empty() {
            return Err(KineticsError::InvalidParameter(
                "product key must not be empty".to_string(),
            ));
        }
        if self.get(&spec.key).is_some() {
            return Err(KineticsError::InvalidParameter(format!(
                "duplicate product key '{}'",
                spec.key
            )));
        }
        if !(spec.alpha.is_finite() && spec.beta.is_finite()) {
            return Err(KineticsError::InvalidParameter(format!(
                "product '{}' has non-finite alpha/beta",
                spec.key
            )));
        }
        if !(spec.p0.is_finite() && spec.p0 >= 0.0) {
            return Err(KineticsError::InvalidParameter(format!(
                "product '{}' has invalid P0={}",
                spec.key, spec.p0
            )));
        }
        self.specs.push(spec);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ProductSpec> {
        self.specs.iter().find(|s| s.key == key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProductSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl<'a> IntoIterator for &'a ProductSet {
    type Item = &'a ProductSpec;
    type IntoIter = std::slice::Iter<'a, ProductSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}

impl TryFrom<Vec<ProductSpec>> for ProductSet {
    type Error = KineticsError;

    fn try_from(specs: Vec<ProductSpec>) -> Result<Self, Self::Error> {
        let mut set = ProductSet::new();
        for spec in specs {
            set.insert(spec)?;
        }
        Ok(set)
    }
}

impl From<ProductSet> for Vec<ProductSpec> {
    fn from(set: ProductSet) -> Self {
        set.specs
    }
}

/// Integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Explicit Dormand–Prince, switching to Rosenbrock once stiffness is detected.
    #[default]
    Auto,
    /// Explicit Dormand–Prince 5(4) only.
    #[value(name = "dopri5")]
    #[serde(rename = "dopri5")]
    DormandPrince,
    /// Linearly implicit Rosenbrock 4(3) only.
    Rosenbrock,
}

impl Method {
    pub fn display_name(self) -> &'static str {
        match self {
            Method::Auto => "auto",
            Method::DormandPrince => "dopri5",
            Method::Rosenbrock => "ros4",
        }
    }
}

/// Integration bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub rhs_evaluations: usize,
    pub jacobian_evaluations: usize,
    /// Steps accepted at `h_min` despite failing the error test.
    pub floor_steps: usize,
    /// Time at which `Method::Auto` switched to the implicit scheme.
    pub stiff_switch_at: Option<f64>,
}

/// Trajectory of one product, aligned to `SimulationResult::time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTrajectory {
    pub key: String,
    pub values: Vec<f64>,
}

/// Dense simulation output on a fixed grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub time: Vec<f64>,
    pub biomass: Vec<f64>,
    /// Clamped to be non-negative.
    pub substrate: Vec<f64>,
    /// Specific growth rate µ(S) evaluated on the grid.
    pub growth_rate: Vec<f64>,
    /// One trajectory per product, in product-set order.
    pub products: Vec<ProductTrajectory>,
    pub stats: SolverStats,
}

impl SimulationResult {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn product(&self, key: &str) -> Option<&[f64]> {
        self.products
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.values.as_slice())
    }
}

/// Successful kLa regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlaEstimate {
    /// Volumetric mass-transfer coefficient (1/time unit of the input).
    pub kla: f64,
    pub r_squared: f64,
    pub slope: f64,
    pub intercept: f64,
    /// Times of the samples that passed the `0 < DO < saturation` filter.
    pub times: Vec<f64>,
    /// `ln(saturation - DO)` for the retained samples.
    pub log_deficit: Vec<f64>,
    /// Fitted `slope * t + intercept` at the retained times.
    pub predicted: Vec<f64>,
}

/// kLa estimation outcome. Too few usable samples is reported, not raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum KlaOutcome {
    Estimated(KlaEstimate),
    Failed { reason: String },
}

impl KlaOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, KlaOutcome::Estimated(_))
    }

    pub fn estimate(&self) -> Option<&KlaEstimate> {
        match self {
            KlaOutcome::Estimated(e) => Some(e),
            KlaOutcome::Failed { .. } => None,
        }
    }
}

/// Label for one measurement interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthPhase {
    Exponential,
    Growth,
    Stationary,
    Death,
    Transition,
}

impl GrowthPhase {
    pub fn display_name(self) -> &'static str {
        match self {
            GrowthPhase::Exponential => "exponential",
            GrowthPhase::Growth => "growth",
            GrowthPhase::Stationary => "stationary",
            GrowthPhase::Death => "death",
            GrowthPhase::Transition => "transition",
        }
    }
}

/// Classification of the interval `[t_start, t_end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalPhase {
    pub t_start: f64,
    pub t_end: f64,
    pub phase: GrowthPhase,
    /// Instantaneous specific rate over the interval (h⁻¹).
    pub specific_rate: f64,
    /// Relative biomass change in percent, `None` if the start biomass is not positive.
    pub biomass_change_pct: Option<f64>,
}

/// Whole-culture kinetic figures for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CultureSummary {
    pub label: String,
    pub biomass_initial: f64,
    pub biomass_final: f64,
    pub biomass_max: f64,
    pub substrate_consumed: f64,
    pub product_formed: f64,
    pub culture_time: f64,
    pub phase: ExponentialPhaseResult,
    pub doubling_time: Option<f64>,
    /// Yx/s (g X / g S).
    pub biomass_yield: f64,
    /// Yp/s (g P / g S).
    pub product_yield: f64,
    pub biomass_productivity: f64,
    pub product_productivity: f64,
    /// qs normalized by mean biomass.
    pub specific_substrate_uptake: f64,
    /// qp normalized by mean biomass.
    pub specific_product_formation: f64,
    pub intervals: Vec<IntervalPhase>,
}

/// Inputs of one simulation run as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults) and embedded in exported
/// trajectory files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub duration: f64,
    pub initial_biomass: f64,
    pub initial_substrate: f64,
    pub params: KineticParameters,
    pub products: ProductSet,
}

/// A saved simulation (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryFile {
    pub tool: String,
    pub generated: DateTime<Utc>,
    pub method: Method,
    pub config: SimulationConfig,
    pub result: SimulationResult,
}
