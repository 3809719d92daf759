//! Mathematical utilities: the least-squares line fit shared by the detectors.

pub mod ols;

pub use ols::*;
