//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs the stderr log subscriber
//! - runs the analysis / simulation / kLa pipelines
//! - prints reports/plots
//! - writes optional exports

use std::io;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{AnalyzeArgs, Cli, Command, KlaArgs, PlotArgs, SimulateArgs};
use crate::domain::{KineticParameters, PhaseSearch, ProductSet, SimulationConfig};
use crate::error::AppError;
use crate::plot::{Series, SeriesStyle};
use crate::solver::SolverOptions;

pub mod pipeline;

use pipeline::{AnalysisConfig, SimulationRunConfig};

/// Entry point for the `kinetics` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Analyze(args) => handle_analyze(&args),
        Command::Simulate(args) => handle_simulate(&args),
        Command::Kla(args) => handle_kla(&args),
        Command::Plot(args) => handle_plot(&args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn handle_analyze(args: &AnalyzeArgs) -> Result<(), AppError> {
    let config = analysis_config_from_args(args);
    let run = pipeline::run_analysis(&config)?;

    for exp in &run.experiments {
        print!("{}", crate::report::format_culture_summary(&exp.summary));
        if exp.skipped_rows > 0 {
            println!("({} rows skipped during ingest)\n", exp.skipped_rows);
        }
        if let Some(fit) = &exp.manual_fit {
            println!(
                "Manual window [{:.2}, {:.2}] h: mu={:.4} 1/h (R²={:.4})\n",
                fit.start_time, fit.end_time, fit.growth_rate, fit.r_squared
            );
        }
        if config.show_phases {
            println!("{}", crate::report::format_phase_table(&exp.summary.intervals));
        }
        if config.plot {
            println!(
                "{}",
                crate::plot::render_measurement_plot(
                    &exp.data,
                    &exp.summary.phase,
                    config.plot_width,
                    config.plot_height,
                )
            );
        }
    }

    let summaries = run.summaries();
    if summaries.len() > 1 {
        println!("{}", crate::report::format_comparison_table(&summaries));
    }

    if let Some(path) = &config.export_summaries {
        crate::io::export::write_summaries_csv(path, &summaries)?;
        info!(file = %path.display(), "wrote summary CSV");
    }

    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<(), AppError> {
    let config = simulation_config_from_args(args)?;
    let result = pipeline::run_simulation(&config)?;

    let method = pipeline::effective_method(config.solver.method, &result);
    print!(
        "{}",
        crate::report::format_simulation(&config.simulation, method, &result)
    );

    if config.plot {
        println!(
            "{}",
            crate::plot::render_trajectory_plot(&result, config.plot_width, config.plot_height)
        );
    }

    if let Some(path) = &config.export_csv {
        crate::io::export::write_trajectory_csv(path, &result)?;
        info!(file = %path.display(), "wrote trajectory CSV");
    }
    if let Some(path) = &config.export_json {
        crate::io::trajectory::write_trajectory_json(path, &config.simulation, method, &result)?;
        info!(file = %path.display(), "wrote trajectory JSON");
    }

    Ok(())
}

fn handle_kla(args: &KlaArgs) -> Result<(), AppError> {
    let (data, outcome) = pipeline::run_kla(&args.input, args.saturation)?;
    print!("{}", crate::report::format_kla(&outcome, args.saturation));

    if let (true, Some(est)) = (args.plot.plot, outcome.estimate()) {
        let series = [
            Series {
                label: "ln(C*-C)".to_string(),
                symbol: 'o',
                style: SeriesStyle::Points,
                points: est.times.iter().copied().zip(est.log_deficit.iter().copied()).collect(),
            },
            Series {
                label: "fit".to_string(),
                symbol: '-',
                style: SeriesStyle::Line,
                points: est.times.iter().copied().zip(est.predicted.iter().copied()).collect(),
            },
        ];
        println!(
            "{}",
            crate::plot::render_plot(&series, args.plot.width, args.plot.height)
        );
    }
    if !data.row_errors.is_empty() {
        println!("({} rows skipped during ingest)", data.row_errors.len());
    }
    Ok(())
}

fn handle_plot(args: &PlotArgs) -> Result<(), AppError> {
    let doc = crate::io::trajectory::read_trajectory_json(&args.trajectory)?;
    println!(
        "Trajectory from {} ({}), method={}",
        doc.tool,
        doc.generated.to_rfc3339(),
        doc.method.display_name()
    );
    let plot = crate::plot::render_trajectory_plot(&doc.result, args.width, args.height);
    println!("{plot}");
    Ok(())
}

pub fn analysis_config_from_args(args: &AnalyzeArgs) -> AnalysisConfig {
    AnalysisConfig {
        inputs: args.inputs.clone(),
        search: PhaseSearch {
            min_window: args.min_window,
            max_window: args.max_window,
        },
        manual_window: args.start.zip(args.end),
        show_phases: args.phases,
        plot: args.plot.plot,
        plot_width: args.plot.width,
        plot_height: args.plot.height,
        export_summaries: args.export.clone(),
    }
}

/// Build the simulation config; product keys are validated here (exit code 2).
pub fn simulation_config_from_args(args: &SimulateArgs) -> Result<SimulationRunConfig, AppError> {
    let products = ProductSet::try_from(args.products.clone())?;
    Ok(SimulationRunConfig {
        simulation: SimulationConfig {
            duration: args.duration,
            initial_biomass: args.x0,
            initial_substrate: args.s0,
            params: KineticParameters {
                mu_max: args.mu_max,
                ks: args.ks,
                yxs: args.yxs,
                ms: args.ms,
            },
            products,
        },
        solver: SolverOptions {
            method: args.method,
            rtol: args.rtol,
            atol: args.atol,
            h_min: args.h_min,
            h_max: args.h_max,
            max_steps: args.max_steps,
            output_points: args.points,
        },
        plot: args.plot.plot,
        plot_width: args.plot.width,
        plot_height: args.plot.height,
        export_csv: args.export.clone(),
        export_json: args.export_json.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulate_flags_map_into_configs() {
        let cli = Cli::try_parse_from([
            "kinetics",
            "simulate",
            "--duration",
            "24",
            "--product",
            "AG:0.5:0.1",
            "--h-max",
            "0.5",
            "--points",
            "200",
        ])
        .unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let config = simulation_config_from_args(&args).unwrap();
        assert_eq!(config.simulation.duration, 24.0);
        assert_eq!(config.simulation.products.len(), 1);
        assert_eq!(config.solver.h_max, Some(0.5));
        assert_eq!(config.solver.output_points, 200);
    }

    #[test]
    fn duplicate_products_exit_with_code_2() {
        let cli = Cli::try_parse_from([
            "kinetics",
            "simulate",
            "--product",
            "AG:0.5:0.1",
            "--product",
            "AG:0.2:0.0",
        ])
        .unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let err = simulation_config_from_args(&args).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn analyze_flags_map_into_search() {
        let cli =
            Cli::try_parse_from(["kinetics", "analyze", "a.csv", "--max-window", "6"]).unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        let config = analysis_config_from_args(&args);
        assert_eq!(config.search.max_window, Some(6));
        assert_eq!(config.search.min_window, 3);
        assert_eq!(config.manual_window, None);
    }
}
