//! URL extraction and per-job accumulation

use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[!-~]+").expect("valid url regex"));

/// Extract URLs from text, de-duplicated, in order of first appearance
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in URL_RE.find_iter(text) {
        if !found.iter().any(|u| u == m.as_str()) {
            found.push(m.as_str().to_string());
        }
    }
    found
}

/// Accumulates the URLs seen in one job's output over its lifetime.
///
/// The first time any URL is seen, `absorb` returns a banner block listing
/// everything collected so far; URLs that reappear later are absorbed into
/// the set without a new announcement. The accumulator is discarded (and the
/// banner re-armed) only when the job is recreated.
#[derive(Debug, Default)]
pub struct UrlAccumulator {
    seen: Vec<String>,
    announced: bool,
}

impl UrlAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb URLs from `text`; returns the one-time banner on first sighting
    pub fn absorb(&mut self, text: &str) -> Option<Vec<String>> {
        for url in extract_urls(text) {
            if !self.seen.contains(&url) {
                self.seen.push(url);
            }
        }

        if self.announced || self.seen.is_empty() {
            return None;
        }
        self.announced = true;

        let mut banner = vec!["Extracted URLs:".to_string()];
        banner.extend(self.seen.iter().map(|u| format!("  {u}")));
        Some(banner)
    }

    /// All URLs seen so far, in order of first appearance
    pub fn urls(&self) -> &[String] {
        &self.seen
    }
}
