//! Export results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::path::Path;

use crate::domain::{CultureSummary, SimulationResult};
use crate::error::AppError;

/// Write a simulated trajectory: one row per output time, one column per state.
///
/// Columns: `time,biomass,substrate,growth_rate,<product keys...>`.
pub fn write_trajectory_csv(path: &Path, result: &SimulationResult) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;

    let mut header = vec![
        "time".to_string(),
        "biomass".to_string(),
        "substrate".to_string(),
        "growth_rate".to_string(),
    ];
    header.extend(result.products.iter().map(|p| p.key.clone()));
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for k in 0..result.len() {
        let mut row = vec![
            format!("{:.6}", result.time[k]),
            format!("{:.10}", result.biomass[k]),
            format!("{:.10}", result.substrate[k]),
            format!("{:.10}", result.growth_rate[k]),
        ];
        row.extend(
            result
                .products
                .iter()
                .map(|p| p.values.get(k).map(|v| format!("{v:.10}")).unwrap_or_default()),
        );
        writer
            .write_record(&row)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

/// Write one row of kinetic figures per analyzed experiment.
pub fn write_summaries_csv(path: &Path, summaries: &[CultureSummary]) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;

    writer
        .write_record([
            "label",
            "phase_detected",
            "mu_max",
            "r_squared",
            "phase_start",
            "phase_end",
            "doubling_time",
            "biomass_max",
            "substrate_consumed",
            "product_formed",
            "yxs",
            "yps",
            "biomass_productivity",
            "product_productivity",
            "qs",
            "qp",
        ])
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for s in summaries {
        writer
            .write_record([
                s.label.clone(),
                s.phase.detected.to_string(),
                format!("{:.6}", s.phase.growth_rate),
                format!("{:.6}", s.phase.r_squared),
                format!("{:.4}", s.phase.start_time),
                format!("{:.4}", s.phase.end_time),
                s.doubling_time.map(|v| format!("{v:.4}")).unwrap_or_default(),
                format!("{:.6}", s.biomass_max),
                format!("{:.6}", s.substrate_consumed),
                format!("{:.6}", s.product_formed),
                format!("{:.6}", s.biomass_yield),
                format!("{:.6}", s.product_yield),
                format!("{:.6}", s.biomass_productivity),
                format!("{:.6}", s.product_productivity),
                format!("{:.6}", s.specific_substrate_uptake),
                format!("{:.6}", s.specific_product_formation),
            ])
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

fn create_writer(path: &Path) -> Result<csv::Writer<File>, AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display()))
    })?;
    Ok(csv::Writer::from_writer(file))
}
