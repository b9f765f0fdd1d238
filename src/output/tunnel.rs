//! Reformatting of tunnel-style diagnostic output
//!
//! Tunneling tools redraw a full-screen status panel that is useless once
//! escape-cleaned. The already-stripped text is re-parsed into its key/value
//! fields and request log lines, and re-rendered as a compact summary. Text
//! with no recognized structure is left for the caller to pass through.

/// Structured fields recovered from a tunnel status panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelReport {
    pub session_status: Option<String>,
    pub account: Option<String>,
    pub region: Option<String>,
    pub web_interface: Option<String>,
    pub forwarding: Vec<String>,
    pub requests: Vec<String>,
}

const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

impl TunnelReport {
    /// Parse stripped text; `None` when nothing recognizable was found
    pub fn parse(text: &str) -> Option<Self> {
        let mut report = Self::default();

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(value) = field_value(line, "Forwarding") {
                report.forwarding.push(value.to_string());
            } else if let Some(value) = field_value(line, "Session Status") {
                report.session_status = Some(value.to_string());
            } else if let Some(value) = field_value(line, "Account") {
                report.account = Some(value.to_string());
            } else if let Some(value) = field_value(line, "Region") {
                report.region = Some(value.to_string());
            } else if let Some(value) = field_value(line, "Web Interface") {
                report.web_interface = Some(value.to_string());
            } else if is_request_line(line) {
                report.requests.push(collapse_whitespace(line));
            }
        }

        if report == Self::default() {
            None
        } else {
            Some(report)
        }
    }

    /// Render the compact summary replacing the raw panel
    pub fn render(&self) -> Vec<String> {
        let mut out = vec!["TUNNEL SESSION".to_string()];
        if let Some(status) = &self.session_status {
            out.push(format!("STATUS: {status}"));
        }
        if let Some(account) = &self.account {
            out.push(format!("ACCOUNT: {account}"));
        }
        if let Some(region) = &self.region {
            out.push(format!("REGION: {region}"));
        }
        if let Some(web) = &self.web_interface {
            out.push(format!("WEB INTERFACE: {web}"));
        }
        for forward in &self.forwarding {
            out.push(format!("FORWARDING URL: {forward}"));
        }
        for request in &self.requests {
            out.push(format!("REQUEST: {request}"));
        }
        out
    }
}

/// Value of a `Key   value` line; requires whitespace between key and value
fn field_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?;
    let value = rest.trim_start();
    if value.is_empty() || value.len() == rest.len() {
        return None;
    }
    Some(value)
}

/// A `METHOD PATH STATUS` request log line
fn is_request_line(line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    let Some(method) = tokens.next() else {
        return false;
    };
    if !METHODS.contains(&method) {
        return false;
    }
    tokens.any(|t| t.len() == 3 && t.chars().all(|c| c.is_ascii_digit()))
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}
