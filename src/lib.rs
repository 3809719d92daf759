//! `culture-kinetics` library crate.
//!
//! The binary (`kinetics`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the numerical modules (`fit`, `sim`, `solver`) are reusable on their own
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod sim;
pub mod solver;
