//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - result exports to CSV (`export`)
//! - trajectory JSON read/write (`trajectory`)

pub mod export;
pub mod ingest;
pub mod trajectory;

pub use export::*;
pub use ingest::*;
pub use trajectory::*;
