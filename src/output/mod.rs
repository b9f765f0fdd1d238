//! Output processing pipeline
//!
//! Raw process output flows chunk-by-chunk through the per-job router,
//! which reconciles partial lines, optionally runs the line processor
//! (escape stripping, special-case reformatting, URL extraction), adds
//! timestamps, and appends to the job's log store.

pub mod ansi;
pub mod router;
pub mod tunnel;
pub mod urls;

pub use ansi::*;
pub use router::*;
pub use tunnel::*;
pub use urls::*;
