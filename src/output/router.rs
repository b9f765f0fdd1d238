//! Per-job output routing: chunk reconciliation, cleaning, timestamps
//!
//! Raw chunks from a job's stdout and stderr arrive asynchronously and may
//! end mid-line; each stream keeps its own partial-line buffer so completed
//! lines are delivered intact. Lines are never mutated after append.

use chrono::Local;

use crate::core::settings::SpecialFormat;
use crate::core::LogStore;

use super::ansi::strip_ansi;
use super::tunnel::TunnelReport;
use super::urls::UrlAccumulator;

/// How a job's output is treated, resolved at spawn time
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    /// PTY mode with ANSI cleaning: run the full line processor
    pub clean: bool,
    /// Structured reformatting for a matched special handler
    pub special: Option<SpecialFormat>,
    /// Prefix non-empty lines with a timestamp
    pub timestamps: bool,
    /// Timestamp format, no spaces
    pub timestamp_format: &'a str,
}

/// Routes one job's raw output chunks into its log store
#[derive(Debug, Default)]
pub struct OutputRouter {
    pending_out: String,
    pending_err: String,
    urls: UrlAccumulator,
}

impl OutputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a raw chunk from stdout or stderr
    pub fn route(&mut self, store: &mut LogStore, ctx: &RouteContext, chunk: &str, from_stderr: bool) {
        let pending = if from_stderr {
            &mut self.pending_err
        } else {
            &mut self.pending_out
        };
        pending.push_str(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = pending.find('\n') {
            let line: String = pending.drain(..=pos).collect();
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }

        if !lines.is_empty() {
            self.deliver(store, ctx, lines, from_stderr);
        }
    }

    /// Flush trailing partial lines, called when the process exits
    pub fn flush(&mut self, store: &mut LogStore, ctx: &RouteContext) {
        for from_stderr in [false, true] {
            let pending = if from_stderr {
                &mut self.pending_err
            } else {
                &mut self.pending_out
            };
            if pending.is_empty() {
                continue;
            }
            let line = std::mem::take(pending).trim_end_matches('\r').to_string();
            self.deliver(store, ctx, vec![line], from_stderr);
        }
    }

    fn deliver(&mut self, store: &mut LogStore, ctx: &RouteContext, lines: Vec<String>, from_stderr: bool) {
        let lines = if ctx.clean {
            self.process(ctx, lines)
        } else {
            lines
        };

        for line in lines {
            if line.is_empty() {
                // empty lines keep their place but get no timestamp prefix
                store.push(String::new(), from_stderr);
            } else if ctx.timestamps {
                let stamp = Local::now().format(ctx.timestamp_format);
                store.push(format!("{stamp} {line}"), from_stderr);
            } else {
                store.push(line, from_stderr);
            }
        }
    }

    /// The line processor: strip escapes, reformat recognized diagnostics,
    /// accumulate URLs and emit the one-time banner
    fn process(&mut self, ctx: &RouteContext, lines: Vec<String>) -> Vec<String> {
        let stripped: Vec<String> = lines.iter().map(|l| strip_ansi(l)).collect();

        let mut out = match ctx.special {
            Some(SpecialFormat::Tunnel) => match TunnelReport::parse(&stripped.join("\n")) {
                Some(report) => report.render(),
                None => stripped,
            },
            None => stripped,
        };

        if let Some(banner) = self.urls.absorb(&out.join("\n")) {
            out.extend(banner);
        }
        out
    }
}
