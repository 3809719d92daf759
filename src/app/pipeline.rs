//! Shared pipelines behind the CLI commands.
//!
//! Keeping the workflows here keeps `app` focused on presentation:
//! - analysis: ingest CSVs -> summarize experiments in parallel -> optional manual fits
//! - simulation: build config -> integrate -> trajectories
//! - kLa: ingest DO file -> regression

use std::path::PathBuf;

use tracing::info;

use crate::domain::{
    CultureSummary, ExponentialPhaseResult, KlaOutcome, Measurements, Method, PhaseSearch,
    SimulationConfig, SimulationResult,
};
use crate::error::AppError;
use crate::fit::{analyze_batch, estimate_kla, fit_growth_window};
use crate::io::ingest::{IngestedOxygen, load_measurements, load_oxygen};
use crate::sim::simulate_config;
use crate::solver::SolverOptions;

/// Resolved settings for an `analyze` run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub inputs: Vec<PathBuf>,
    pub search: PhaseSearch,
    /// Inclusive index range for a manual growth-window fit.
    pub manual_window: Option<(usize, usize)>,
    pub show_phases: bool,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_summaries: Option<PathBuf>,
}

/// Resolved settings for a `simulate` run.
#[derive(Debug, Clone)]
pub struct SimulationRunConfig {
    pub simulation: SimulationConfig,
    pub solver: SolverOptions,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// One analyzed experiment.
#[derive(Debug, Clone)]
pub struct ExperimentOutput {
    pub data: Measurements,
    pub summary: CultureSummary,
    pub manual_fit: Option<ExponentialPhaseResult>,
    pub skipped_rows: usize,
}

/// All computed outputs of a single `analyze` run.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub experiments: Vec<ExperimentOutput>,
}

impl AnalysisOutput {
    pub fn summaries(&self) -> Vec<CultureSummary> {
        self.experiments.iter().map(|e| e.summary.clone()).collect()
    }
}

/// Ingest every file, then summarize the experiments in parallel.
///
/// Any file or numerical error aborts the run; results keep input order.
pub fn run_analysis(config: &AnalysisConfig) -> Result<AnalysisOutput, AppError> {
    let mut ingested = Vec::with_capacity(config.inputs.len());
    for path in &config.inputs {
        let data = load_measurements(path)?;
        info!(
            file = %path.display(),
            rows = data.rows_read,
            used = data.data.len(),
            "loaded measurements"
        );
        ingested.push(data);
    }

    let datasets: Vec<Measurements> = ingested.iter().map(|i| i.data.clone()).collect();
    let summaries = analyze_batch(&datasets, &config.search);

    let mut experiments = Vec::with_capacity(ingested.len());
    for (ingest, summary) in ingested.into_iter().zip(summaries) {
        let summary = summary
            .map_err(|e| AppError::new(e.exit_code(), format!("{}: {e}", ingest.data.label)))?;
        let manual_fit = match config.manual_window {
            Some((start, end)) => Some(
                fit_growth_window(&ingest.data.time, &ingest.data.biomass, start, end).map_err(
                    |e| AppError::new(e.exit_code(), format!("{}: {e}", ingest.data.label)),
                )?,
            ),
            None => None,
        };
        experiments.push(ExperimentOutput {
            skipped_rows: ingest.row_errors.len(),
            data: ingest.data,
            summary,
            manual_fit,
        });
    }

    Ok(AnalysisOutput { experiments })
}

/// Integrate the configured culture.
pub fn run_simulation(config: &SimulationRunConfig) -> Result<SimulationResult, AppError> {
    let result = simulate_config(&config.simulation, &config.solver)?;
    info!(
        method = config.solver.method.display_name(),
        steps = result.stats.accepted_steps,
        "simulation finished"
    );
    Ok(result)
}

/// Method actually used, for reporting (`auto` resolves to what ran last).
pub fn effective_method(requested: Method, result: &SimulationResult) -> Method {
    match (requested, result.stats.stiff_switch_at) {
        (Method::Auto, Some(_)) => Method::Rosenbrock,
        (Method::Auto, None) => Method::DormandPrince,
        (m, _) => m,
    }
}

/// Ingest a DO file and estimate kLa.
pub fn run_kla(
    path: &std::path::Path,
    saturation: f64,
) -> Result<(IngestedOxygen, KlaOutcome), AppError> {
    let data = load_oxygen(path)?;
    let outcome = estimate_kla(&data.time, &data.dissolved_oxygen, saturation)?;
    Ok((data, outcome))
}
