//! Terminal escape-sequence stripping
//!
//! Best-effort cleaning, not a terminal emulator: cursor/color CSI codes,
//! charset selects, and OS-command sequences are removed; any other escape
//! form passes through untouched.

use once_cell::sync::Lazy;
use regex::Regex;

static CSI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]").expect("valid csi regex"));

static CHARSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\([A-Za-z]").expect("valid charset regex"));

static OSC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\][0-9]+;[^\x07]*\x07").expect("valid osc regex"));

/// Strip recognized terminal control sequences and carriage returns
pub fn strip_ansi(input: &str) -> String {
    let pass = CSI_RE.replace_all(input, "");
    let pass = CHARSET_RE.replace_all(&pass, "");
    let pass = OSC_RE.replace_all(&pass, "");
    pass.replace('\r', "")
}
