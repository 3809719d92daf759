//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - measurement series and kinetic inputs (`Measurements`, `KineticParameters`, `ProductSet`)
//! - fit outputs (`RegressionResult`, `ExponentialPhaseResult`, `KlaOutcome`, `CultureSummary`)
//! - simulation outputs (`SimulationResult`, `SolverStats`, `TrajectoryFile`)

pub mod types;

pub use types::*;
