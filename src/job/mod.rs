//! Job management module
//!
//! This module handles spawning, monitoring, and restarting the supervised
//! child processes, and owns the per-job log stores.

mod supervisor;
mod types;

pub use supervisor::*;
pub use types::*;
