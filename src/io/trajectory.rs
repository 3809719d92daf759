//! Read/write trajectory JSON files.
//!
//! A trajectory file is the portable record of one simulation run:
//! - the inputs (initial conditions, kinetic constants, products)
//! - the integration scheme and solver statistics
//! - the dense output grid, ready for re-plotting
//!
//! The schema is defined by `domain::TrajectoryFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{Method, SimulationConfig, SimulationResult, TrajectoryFile};
use crate::error::AppError;

pub const TOOL_NAME: &str = "kinetics";

/// Write a trajectory JSON file.
pub fn write_trajectory_json(
    path: &Path,
    config: &SimulationConfig,
    method: Method,
    result: &SimulationResult,
) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create trajectory JSON '{}': {e}", path.display()))
    })?;

    let doc = TrajectoryFile {
        tool: TOOL_NAME.to_string(),
        generated: Utc::now(),
        method,
        config: config.clone(),
        result: result.clone(),
    };

    serde_json::to_writer_pretty(file, &doc)
        .map_err(|e| AppError::new(2, format!("Failed to write trajectory JSON: {e}")))
}

/// Read a trajectory JSON file and check that its series line up.
pub fn read_trajectory_json(path: &Path) -> Result<TrajectoryFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open trajectory JSON '{}': {e}", path.display()))
    })?;
    let doc: TrajectoryFile = serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid trajectory JSON: {e}")))?;

    let n = doc.result.time.len();
    let aligned = doc.result.biomass.len() == n
        && doc.result.substrate.len() == n
        && doc.result.growth_rate.len() == n
        && doc.result.products.iter().all(|p| p.values.len() == n);
    if !aligned {
        return Err(AppError::new(
            2,
            format!("Trajectory JSON '{}' has misaligned series.", path.display()),
        ));
    }
    Ok(doc)
}
