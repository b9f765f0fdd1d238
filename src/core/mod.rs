//! Core building blocks of the supervision pipeline:
//! - Runtime settings and the special-handler table
//! - Event and notice types
//! - Per-job log storage

pub mod events;
pub mod log;
pub mod settings;

pub use events::*;
pub use log::*;
pub use settings::*;
