//! Regression-based analysis of measured cultures.
//!
//! Responsibilities:
//!
//! - enumerate candidate windows (`window`)
//! - detect the exponential phase and fit manual windows (`phase`)
//! - whole-culture kinetic figures and interval labels (`summary`)
//! - dynamic-method kLa estimation (`kla`)

pub mod kla;
pub mod phase;
pub mod summary;
pub mod window;

pub use kla::*;
pub use phase::*;
pub use summary::*;
pub use window::*;
