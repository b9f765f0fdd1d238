//! Cross-job merged log view
//!
//! Jobs running in PTY mode are excluded: their escape-cleaned, reformatted
//! output loses line-level timing fidelity, so they are listed by name
//! instead. Everything is recomputed per call; log volumes are bounded by
//! the history cap.

use chrono::NaiveTime;

use crate::job::Job;

/// One line of the merged view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedEntry {
    /// Owning job name
    pub job: String,
    /// Line content as stored (timestamp prefix included)
    pub content: String,
    /// Derived absolute time in milliseconds, the sort key
    pub sort_ms: i64,
    /// Position of the line within its job's log
    pub line_index: usize,
}

/// Time-ordered combination of all eligible jobs' log entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedView {
    pub entries: Vec<MergedEntry>,
    /// PTY-mode jobs excluded from the merge
    pub pty_skipped: Vec<String>,
}

/// Merge the given jobs' logs into one time-ordered sequence.
///
/// Lines with a leading token matching `timestamp_format` sort by that time
/// combined with the job's start date; other lines get a synthetic,
/// monotonically increasing key derived from their position, so the order
/// is deterministic either way. Ties keep per-job append order (stable sort).
pub fn merged_view<'a, I>(jobs: I, timestamp_format: &str) -> MergedView
where
    I: IntoIterator<Item = &'a Job>,
{
    let mut view = MergedView::default();

    for job in jobs {
        if job.pty {
            view.pty_skipped.push(job.name.clone());
            continue;
        }

        let start = job.created_at.naive_local();
        let start_ms = start.and_utc().timestamp_millis();
        let date = start.date();

        for (line_index, line) in job.log.iter().enumerate() {
            let parsed = line
                .content
                .split_whitespace()
                .next()
                .and_then(|token| NaiveTime::parse_from_str(token, timestamp_format).ok())
                .map(|time| date.and_time(time).and_utc().timestamp_millis());

            view.entries.push(MergedEntry {
                job: job.name.clone(),
                content: line.content.clone(),
                sort_ms: parsed.unwrap_or(start_ms + line_index as i64),
                line_index,
            });
        }
    }

    view.entries.sort_by_key(|entry| entry.sort_ms);
    view
}
