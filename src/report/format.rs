//! Formatted terminal output for analyses, simulations and kLa runs.
//!
//! We keep formatting code in one place so:
//! - the numerical code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::domain::{
    CultureSummary, IntervalPhase, KlaOutcome, Method, SimulationConfig, SimulationResult,
};

/// Format the kinetic summary of one experiment.
pub fn format_culture_summary(summary: &CultureSummary) -> String {
    let mut out = String::new();
    let phase = &summary.phase;

    out.push_str(&format!("=== {} ===\n", summary.label));
    out.push_str(&format!(
        "Biomass: initial={:.4} final={:.4} max={:.4} g/L\n",
        summary.biomass_initial, summary.biomass_final, summary.biomass_max
    ));
    out.push_str(&format!(
        "Substrate consumed: {:.4} g/L | Product formed: {:.4} g/L | Culture time: {:.2} h\n",
        summary.substrate_consumed, summary.product_formed, summary.culture_time
    ));

    out.push_str("\nExponential phase:\n");
    if phase.detected {
        out.push_str(&format!(
            "- window: [{:.2}, {:.2}] h ({:.2} h)\n",
            phase.start_time, phase.end_time, phase.duration
        ));
        out.push_str(&format!(
            "- mu_max: {:.4} 1/h (R²={:.4})\n",
            phase.growth_rate, phase.r_squared
        ));
    } else if phase.end_time > phase.start_time {
        out.push_str(&format!(
            "- not detected in [{:.2}, {:.2}] h\n",
            phase.start_time, phase.end_time
        ));
    } else {
        out.push_str("- not enough points to search\n");
    }
    out.push_str(&format!(
        "- doubling time: {}\n",
        summary
            .doubling_time
            .map(|td| format!("{td:.3} h"))
            .unwrap_or_else(|| "n/a".to_string())
    ));

    out.push_str("\nYields and rates:\n");
    out.push_str(&format!("- Yx/s: {:.4} g/g\n", summary.biomass_yield));
    out.push_str(&format!("- Yp/s: {:.4} g/g\n", summary.product_yield));
    out.push_str(&format!(
        "- productivity: biomass {:.4} g/L/h, product {:.4} g/L/h\n",
        summary.biomass_productivity, summary.product_productivity
    ));
    out.push_str(&format!(
        "- specific rates: qs {:.4} g/g/h, qp {:.4} g/g/h\n",
        summary.specific_substrate_uptake, summary.specific_product_formation
    ));
    out.push('\n');

    out
}

/// Format the per-interval phase classification.
pub fn format_phase_table(intervals: &[IntervalPhase]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>10} {:>10} {:>12} {:>10} {:<12}",
            "t_start", "t_end", "mu (1/h)", "dX (%)", "phase"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<10} {:-<10} {:-<12} {:-<10} {:-<12}", "", "", "", "", "").trim_end());
    out.push('\n');

    for iv in intervals {
        let change = iv
            .biomass_change_pct
            .map(|v| format!("{v:.1}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(
            format!(
                "{:>10.2} {:>10.2} {:>12.4} {:>10} {:<12}",
                iv.t_start,
                iv.t_end,
                iv.specific_rate,
                change,
                iv.phase.display_name()
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// One line per experiment, for comparing a batch of runs.
pub fn format_comparison_table(summaries: &[CultureSummary]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:>10} {:>8} {:>10} {:>10} {:>10}",
            "experiment", "mu_max", "R²", "td (h)", "Yx/s", "Xmax"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!("{:-<20} {:-<10} {:-<8} {:-<10} {:-<10} {:-<10}", "", "", "", "", "", "")
            .trim_end(),
    );
    out.push('\n');

    for s in summaries {
        let td = s
            .doubling_time
            .map(|v| format!("{v:.3}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(
            format!(
                "{:<20} {:>10.4} {:>8.4} {:>10} {:>10.4} {:>10.4}",
                truncate(&s.label, 20),
                s.phase.growth_rate,
                s.phase.r_squared,
                td,
                s.biomass_yield,
                s.biomass_max
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Format the inputs and end state of a simulation run.
pub fn format_simulation(
    config: &SimulationConfig,
    method: Method,
    result: &SimulationResult,
) -> String {
    let mut out = String::new();
    let p = &config.params;

    out.push_str("=== kinetics - batch culture simulation ===\n");
    out.push_str(&format!(
        "Monod: mu_max={} Ks={} | Pirt: Yx/s={} ms={}\n",
        p.mu_max, p.ks, p.yxs, p.ms
    ));
    out.push_str(&format!(
        "Initial: X0={} S0={} | duration={} h\n",
        config.initial_biomass, config.initial_substrate, config.duration
    ));
    for spec in &config.products {
        out.push_str(&format!(
            "Product {}: alpha={} beta={} P0={}\n",
            spec.key, spec.alpha, spec.beta, spec.p0
        ));
    }

    let stats = &result.stats;
    out.push_str(&format!(
        "\nSolver: {} | steps={} rejected={} f-evals={} jacobians={}\n",
        method.display_name(),
        stats.accepted_steps,
        stats.rejected_steps,
        stats.rhs_evaluations,
        stats.jacobian_evaluations
    ));
    if let Some(t) = stats.stiff_switch_at {
        out.push_str(&format!("- switched to ros4 at t={t:.4} h\n"));
    }
    if stats.floor_steps > 0 {
        out.push_str(&format!("- {} steps accepted at minimum step size\n", stats.floor_steps));
    }

    let last = result.len().saturating_sub(1);
    if !result.is_empty() {
        out.push_str(&format!("\nFinal state (t={:.2} h):\n", result.time[last]));
        out.push_str(&format!("- X: {:.4} g/L\n", result.biomass[last]));
        out.push_str(&format!("- S: {:.4} g/L\n", result.substrate[last]));
        for p in &result.products {
            if let Some(v) = p.values.get(last) {
                out.push_str(&format!("- {}: {v:.4} g/L\n", p.key));
            }
        }
        if let Some(t) = depletion_time(result) {
            out.push_str(&format!("- substrate depleted at t≈{t:.2} h\n"));
        }
    }
    out.push('\n');

    out
}

/// Format a kLa estimation outcome.
pub fn format_kla(outcome: &KlaOutcome, saturation: f64) -> String {
    match outcome {
        KlaOutcome::Estimated(est) => {
            let mut out = String::new();
            out.push_str("=== kLa (dynamic method) ===\n");
            out.push_str(&format!("Saturation: {saturation}\n"));
            out.push_str(&format!("Points used: {}\n", est.times.len()));
            out.push_str(&format!(
                "kLa: {:.5} 1/time (R²={:.4})\n",
                est.kla, est.r_squared
            ));
            out.push_str(&format!(
                "ln(C*-C) = {:.5}·t + {:.5}\n",
                est.slope, est.intercept
            ));
            out
        }
        KlaOutcome::Failed { reason } => format!("kLa not estimated: {reason}\n"),
    }
}

/// First output time at which the substrate is exhausted.
fn depletion_time(result: &SimulationResult) -> Option<f64> {
    result
        .substrate
        .iter()
        .position(|&s| s <= 1e-6)
        .map(|k| result.time[k])
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
