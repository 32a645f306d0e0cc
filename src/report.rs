//! Ingestion diagnostics.
//!
//! An [`IngestReport`] explains every exclusion made during one run: how many
//! archives and JSON members were seen, how many posts were adopted, and why
//! everything else was skipped. It is written only while the run is in
//! progress and read-only afterwards.

use serde::Serialize;

/// Why a JSON member or array element was not turned into a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Path outside the recognized post containers.
    WrongPath,
    /// Top-level JSON value is not an array.
    NotArray,
    /// Array with no element that looks like a post.
    NotPostShaped,
    /// Element without a finite numeric `timestamp` inside the calendar range.
    MissingTimestamp,
    /// Member is not UTF-8 or not valid JSON.
    ParseFailure,
}

impl SkipReason {
    /// Every reason, in report order.
    pub const ALL: [SkipReason; 5] = [
        SkipReason::WrongPath,
        SkipReason::NotArray,
        SkipReason::NotPostShaped,
        SkipReason::MissingTimestamp,
        SkipReason::ParseFailure,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SkipReason::WrongPath => "wrong path",
            SkipReason::NotArray => "not array",
            SkipReason::NotPostShaped => "not posts",
            SkipReason::MissingTimestamp => "no timestamp",
            SkipReason::ParseFailure => "parse failed",
        }
    }
}

/// Skip counters broken out by [`SkipReason`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub wrong_path: u64,
    pub not_array: u64,
    pub not_post_shaped: u64,
    pub missing_timestamp: u64,
    pub parse_failure: u64,
}

impl SkipCounts {
    pub fn get(&self, reason: SkipReason) -> u64 {
        match reason {
            SkipReason::WrongPath => self.wrong_path,
            SkipReason::NotArray => self.not_array,
            SkipReason::NotPostShaped => self.not_post_shaped,
            SkipReason::MissingTimestamp => self.missing_timestamp,
            SkipReason::ParseFailure => self.parse_failure,
        }
    }

    fn bump(&mut self, reason: SkipReason) {
        let slot = match reason {
            SkipReason::WrongPath => &mut self.wrong_path,
            SkipReason::NotArray => &mut self.not_array,
            SkipReason::NotPostShaped => &mut self.not_post_shaped,
            SkipReason::MissingTimestamp => &mut self.missing_timestamp,
            SkipReason::ParseFailure => &mut self.parse_failure,
        };
        *slot += 1;
    }
}

/// Per-archive summary.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub name: String,
    /// SHA-256 of the archive bytes.
    pub sha256: String,
    pub size_bytes: u64,
    /// `None` when the archive could not be opened.
    pub members: Option<usize>,
    pub media_registered: usize,
}

/// Counters and diagnostics for one ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub archive_count: usize,
    pub total_json: u64,
    pub adopted: usize,
    pub duplicates: u64,
    pub skipped: SkipCounts,
    pub errors: Vec<String>,
    pub archives: Vec<ArchiveSummary>,
}

impl IngestReport {
    /// The first `limit` errors, for display.
    pub fn displayed_errors(&self, limit: usize) -> &[String] {
        &self.errors[..self.errors.len().min(limit)]
    }

    /// Number of archives that opened successfully.
    pub fn readable_archives(&self) -> usize {
        self.archives.iter().filter(|a| a.members.is_some()).count()
    }

    /// Render the report as indented lines, showing at most `error_limit` errors.
    pub fn render(&self, error_limit: usize) -> String {
        let mut out = String::new();
        out.push_str(&format!("  archives:               {}\n", self.archive_count));
        out.push_str(&format!("  json files:             {}\n", self.total_json));
        out.push_str(&format!("  adopted posts:          {}\n", self.adopted));
        out.push_str(&format!("  duplicates dropped:     {}\n", self.duplicates));
        for reason in SkipReason::ALL {
            let label = format!("  skipped ({}):", reason.label());
            out.push_str(&format!("{:<26}{}\n", label, self.skipped.get(reason)));
        }
        if !self.errors.is_empty() {
            out.push_str(&format!("  errors ({}):\n", self.errors.len()));
            for err in self.displayed_errors(error_limit) {
                out.push_str(&format!("    {}\n", err));
            }
            let hidden = self.errors.len().saturating_sub(error_limit);
            if hidden > 0 {
                out.push_str(&format!("    … {} more\n", hidden));
            }
        }
        out
    }
}

/// Mutable side of an [`IngestReport`], owned by the orchestrator during a run.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    report: IngestReport,
}

impl ReportBuilder {
    pub fn new(archive_count: usize) -> Self {
        Self {
            report: IngestReport {
                archive_count,
                ..IngestReport::default()
            },
        }
    }

    pub fn json_seen(&mut self) {
        self.report.total_json += 1;
    }

    pub fn skip(&mut self, reason: SkipReason) {
        self.report.skipped.bump(reason);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.report.errors.push(message.into());
    }

    pub fn duplicate(&mut self) {
        self.report.duplicates += 1;
    }

    pub fn archive(&mut self, summary: ArchiveSummary) {
        self.report.archives.push(summary);
    }

    /// Seal the report with the final deduplicated post count.
    pub fn finish(mut self, adopted: usize) -> IngestReport {
        self.report.adopted = adopted;
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reasons_are_counted_separately() {
        let mut builder = ReportBuilder::new(1);
        builder.skip(SkipReason::WrongPath);
        builder.skip(SkipReason::WrongPath);
        builder.skip(SkipReason::MissingTimestamp);
        let report = builder.finish(0);

        assert_eq!(report.skipped.get(SkipReason::WrongPath), 2);
        assert_eq!(report.skipped.get(SkipReason::MissingTimestamp), 1);
        assert_eq!(report.skipped.get(SkipReason::NotArray), 0);
    }

    #[test]
    fn render_lists_every_skip_reason_aligned() {
        let mut builder = ReportBuilder::new(1);
        builder.skip(SkipReason::WrongPath);
        builder.skip(SkipReason::MissingTimestamp);
        let rendered = builder.finish(3).render(8);

        assert!(rendered.contains("  adopted posts:          3\n"));
        assert!(rendered.contains("  skipped (wrong path):   1\n"));
        assert!(rendered.contains("  skipped (not array):    0\n"));
        assert!(rendered.contains("  skipped (not posts):    0\n"));
        assert!(rendered.contains("  skipped (no timestamp): 1\n"));
        assert!(rendered.contains("  skipped (parse failed): 0\n"));
        assert!(!rendered.contains("errors ("));
    }

    #[test]
    fn adopted_is_set_on_finish() {
        let mut builder = ReportBuilder::new(2);
        builder.json_seen();
        builder.duplicate();
        let report = builder.finish(7);
        assert_eq!(report.archive_count, 2);
        assert_eq!(report.total_json, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.adopted, 7);
    }

    #[test]
    fn errors_are_unbounded_but_display_truncates() {
        let mut builder = ReportBuilder::new(1);
        for i in 0..12 {
            builder.error(format!("error {}", i));
        }
        let report = builder.finish(0);
        assert_eq!(report.errors.len(), 12);
        assert_eq!(report.displayed_errors(8).len(), 8);
        assert_eq!(report.displayed_errors(8)[0], "error 0");

        let rendered = report.render(8);
        assert!(rendered.contains("errors (12)"));
        assert!(rendered.contains("error 7"));
        assert!(!rendered.contains("error 8\n"));
        assert!(rendered.contains("4 more"));
    }
}
