//! Command-line parsing for the culture kinetics toolkit.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the numerical code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Method, ProductSpec};
use crate::fit::DEFAULT_SATURATION;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "kinetics",
    version,
    about = "Microbial culture kinetics: growth-phase analysis, batch simulation, kLa"
)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect the exponential phase and summarize kinetics of measured cultures.
    Analyze(AnalyzeArgs),
    /// Simulate a batch culture (Monod growth, Pirt maintenance, Luedeking-Piret products).
    Simulate(SimulateArgs),
    /// Estimate kLa from a dissolved-oxygen re-aeration curve.
    Kla(KlaArgs),
    /// Plot a previously exported trajectory JSON.
    Plot(PlotArgs),
}

/// Terminal plot options shared by every command.
#[derive(Debug, Args, Clone)]
pub struct PlotOpts {
    /// Render an ASCII plot in the terminal.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for analyzing measurement files.
#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    /// Measurement CSV files (`time,biomass,substrate[,product]`), one experiment each.
    #[arg(required = true, value_name = "CSV")]
    pub inputs: Vec<PathBuf>,

    /// Smallest window (points) considered by the phase search.
    #[arg(long, default_value_t = 3)]
    pub min_window: usize,

    /// Cap on the window length (points) to bound the search on long series.
    #[arg(long)]
    pub max_window: Option<usize>,

    /// First index (0-based) of a manually chosen growth window.
    #[arg(long, requires = "end")]
    pub start: Option<usize>,

    /// Last index (0-based, inclusive) of a manually chosen growth window.
    #[arg(long, requires = "start")]
    pub end: Option<usize>,

    /// Print the per-interval phase table.
    #[arg(long)]
    pub phases: bool,

    /// Export one summary row per experiment to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    #[command(flatten)]
    pub plot: PlotOpts,
}

/// Options for simulating a batch culture.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Simulated culture time (h).
    #[arg(long, default_value_t = 48.0)]
    pub duration: f64,

    /// Initial biomass X0 (g/L).
    #[arg(long, default_value_t = 0.2)]
    pub x0: f64,

    /// Initial substrate S0 (g/L).
    #[arg(long, default_value_t = 50.0)]
    pub s0: f64,

    /// Maximum specific growth rate (1/h).
    #[arg(long, default_value_t = 0.347)]
    pub mu_max: f64,

    /// Monod half-saturation constant (g/L).
    #[arg(long, default_value_t = 21.1)]
    pub ks: f64,

    /// Biomass yield on substrate (g/g).
    #[arg(long, default_value_t = 0.13)]
    pub yxs: f64,

    /// Maintenance coefficient (g S / g X / h).
    #[arg(long, default_value_t = 0.01)]
    pub ms: f64,

    /// Product as KEY:ALPHA:BETA[:P0]; repeat for several products.
    #[arg(long = "product", value_name = "KEY:ALPHA:BETA[:P0]", value_parser = parse_product)]
    pub products: Vec<ProductSpec>,

    /// Integration scheme.
    #[arg(long, value_enum, default_value_t = Method::Auto)]
    pub method: Method,

    /// Relative tolerance.
    #[arg(long, default_value_t = 1e-6)]
    pub rtol: f64,

    /// Absolute tolerance.
    #[arg(long, default_value_t = 1e-9)]
    pub atol: f64,

    /// Minimum internal step (h).
    #[arg(long, default_value_t = 1e-3)]
    pub h_min: f64,

    /// Maximum internal step (h). Defaults to the whole horizon.
    #[arg(long)]
    pub h_max: Option<f64>,

    /// Step budget (accepted + rejected).
    #[arg(long, default_value_t = 500_000)]
    pub max_steps: usize,

    /// Number of output points (endpoints included).
    #[arg(long, default_value_t = 1000)]
    pub points: usize,

    /// Export the trajectory to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export inputs + trajectory to JSON (re-plot with `kinetics plot`).
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,

    #[command(flatten)]
    pub plot: PlotOpts,
}

/// Options for kLa estimation.
#[derive(Debug, Args, Clone)]
pub struct KlaArgs {
    /// DO CSV file (`time,do`).
    #[arg(value_name = "CSV")]
    pub input: PathBuf,

    /// Saturation reading C* in the file's units.
    #[arg(long, default_value_t = DEFAULT_SATURATION)]
    pub saturation: f64,

    #[command(flatten)]
    pub plot: PlotOpts,
}

/// Options for plotting a saved trajectory.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Trajectory JSON produced by `kinetics simulate --export-json`.
    #[arg(long, value_name = "JSON")]
    pub trajectory: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Parse `KEY:ALPHA:BETA[:P0]`.
pub fn parse_product(raw: &str) -> Result<ProductSpec, String> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    if !(3..=4).contains(&parts.len()) {
        return Err(format!("expected KEY:ALPHA:BETA[:P0], got '{raw}'"));
    }
    let key = parts[0];
    if key.is_empty() {
        return Err("product key must not be empty".to_string());
    }
    let number = |name: &str, s: &str| {
        s.parse::<f64>()
            .map_err(|_| format!("invalid {name} '{s}' in '{raw}'"))
    };
    let alpha = number("alpha", parts[1])?;
    let beta = number("beta", parts[2])?;
    let p0 = match parts.get(3) {
        Some(s) => number("P0", s)?,
        None => 0.0,
    };
    Ok(ProductSpec::new(key, alpha, beta, p0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_flag_parses_with_and_without_p0() {
        let p = parse_product("AG:0.5:0.1").unwrap();
        assert_eq!(p, ProductSpec::new("AG", 0.5, 0.1, 0.0));
        let p = parse_product("5CG:0:0.02:1.5").unwrap();
        assert_eq!(p.p0, 1.5);
        assert!(parse_product("AG:0.5").is_err());
        assert!(parse_product(":0.5:0.1").is_err());
        assert!(parse_product("AG:x:0.1").is_err());
    }

    #[test]
    fn simulate_defaults_and_repeated_products() {
        let cli = Cli::try_parse_from([
            "kinetics",
            "simulate",
            "--product",
            "AG:0.5:0.1",
            "--product",
            "2CG:0.2:0.05:0.1",
            "--method",
            "dopri5",
        ])
        .unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.products.len(), 2);
        assert_eq!(args.method, Method::DormandPrince);
        assert_eq!(args.duration, 48.0);
        assert_eq!(args.points, 1000);
        assert!(!args.plot.plot);
    }

    #[test]
    fn manual_window_needs_both_bounds() {
        assert!(Cli::try_parse_from(["kinetics", "analyze", "a.csv", "--start", "2"]).is_err());
        let cli = Cli::try_parse_from([
            "kinetics", "-v", "analyze", "a.csv", "b.csv", "--start", "1", "--end", "4",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!((args.start, args.end), (Some(1), Some(4)));
    }
}
