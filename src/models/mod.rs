//! Kinetic models expressed as ODE systems.

pub mod model;

pub use model::*;
