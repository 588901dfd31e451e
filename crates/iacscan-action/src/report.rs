//! Turn scan results into pull request comments.
//!
//! Each finished file gets one summary comment on the conversation and, unless
//! disabled, one review comment per distinct line range carrying every failed
//! finding for that range.

use std::fmt::Write;

use iacscan_core::{
    within_threshold, ChangedFile, Finding, FindingStatus, ScanReport, ScanSummary, Severity,
};

use crate::github::SourceHost;

/// A review comment anchored to a line of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineComment {
    /// Repository path of the file.
    pub path: String,
    /// Start line of the grouped range.
    pub line: u64,
    /// Bulleted markdown body.
    pub body: String,
}

/// Render the conversation comment for one scanned file.
///
/// # Examples
///
/// ```
/// use iacscan_action::report::summary_comment;
/// use iacscan_core::ScanSummary;
///
/// let summary = ScanSummary {
///     file_name: "main.tf".into(),
///     summary_id: "77".into(),
///     passed: 9,
///     failed: 2,
///     critical: 1,
///     high: 1,
///     medium: 0,
///     low: 0,
/// };
/// let body = summary_comment(&summary, "https://reports.example.com");
/// assert!(body.contains("main.tf"));
/// assert!(body.contains("https://reports.example.com?id=77"));
/// ```
pub fn summary_comment(summary: &ScanSummary, report_url: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Security report summary from 6pillars.ai for file `{}`:\n",
        summary.file_name
    );
    let _ = writeln!(out, "- Passed Checks: {}", summary.passed);
    let _ = writeln!(out, "- Failed Checks: {}", summary.failed);
    let _ = writeln!(out, "- Critical Severity: {}", summary.critical);
    let _ = writeln!(out, "- High Severity: {}", summary.high);
    let _ = writeln!(out, "- Medium Severity: {}", summary.medium);
    let _ = writeln!(out, "- Low Severity: {}", summary.low);
    let _ = write!(
        out,
        "\nYou can see the full report at {report_url}?id={}",
        summary.summary_id
    );
    out
}

/// One bullet line for a finding.
fn finding_line(finding: &Finding) -> String {
    match finding.level() {
        Some(level) => format!(
            "{} - {} {} - {}",
            finding.check_id,
            finding.severity,
            level.emoji(),
            finding.description
        ),
        None => format!(
            "{} - {} - {}",
            finding.check_id, finding.severity, finding.description
        ),
    }
}

/// Whether a finding gets an inline comment under `threshold`.
///
/// Only failed checks with a line range qualify. Findings of an unknown
/// severity are kept only when there is no threshold.
pub fn is_commentable(finding: &Finding, threshold: Option<Severity>) -> bool {
    if finding.status != Some(FindingStatus::Failed) || finding.file_line_range.is_none() {
        return false;
    }
    match finding.level() {
        Some(level) => within_threshold(level, threshold),
        None => threshold.is_none(),
    }
}

/// Group commentable findings by line range, in first-seen order.
///
/// Ranges whose start line cannot be parsed are dropped.
pub fn inline_comments(
    path: &str,
    findings: &[Finding],
    threshold: Option<Severity>,
) -> Vec<InlineComment> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for finding in findings.iter().filter(|f| is_commentable(f, threshold)) {
        let Some(range) = finding.file_line_range.as_deref() else {
            continue;
        };
        let line = finding_line(finding);
        match groups.iter_mut().find(|(r, _)| r == range) {
            Some((_, lines)) => lines.push(line),
            None => groups.push((range.to_string(), vec![line])),
        }
    }

    groups
        .into_iter()
        .filter_map(|(range, lines)| {
            let Some(start) = iacscan_core::parse_start_line(&range) else {
                tracing::warn!(path, range = %range, "unparseable line range, skipping comment");
                return None;
            };
            let body = lines
                .iter()
                .map(|l| format!("* {l}"))
                .collect::<Vec<_>>()
                .join("\n");
            Some(InlineComment {
                path: path.to_string(),
                line: start,
                body,
            })
        })
        .collect()
}

/// What happened while reporting one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    /// The summary has a non-zero count at or above the threshold.
    pub breached: bool,
    pub summary_posted: bool,
    pub comments_posted: usize,
    pub comments_failed: usize,
}

/// Posts comments for finished scans.
pub struct Reporter<'a, H: SourceHost + ?Sized> {
    host: &'a H,
    commit_sha: &'a str,
    report_url: &'a str,
    threshold: Option<Severity>,
    skip_comments: bool,
}

impl<'a, H: SourceHost + ?Sized> Reporter<'a, H> {
    pub fn new(
        host: &'a H,
        commit_sha: &'a str,
        report_url: &'a str,
        threshold: Option<Severity>,
        skip_comments: bool,
    ) -> Self {
        Self {
            host,
            commit_sha,
            report_url,
            threshold,
            skip_comments,
        }
    }

    /// Post the summary and inline comments for `file`.
    ///
    /// Posting failures are logged and counted, never returned.
    pub async fn report(&self, file: &ChangedFile, report: &ScanReport) -> FileReport {
        let mut outcome = FileReport {
            breached: report.summary.breaches(self.threshold),
            ..FileReport::default()
        };

        let summary = summary_comment(&report.summary, self.report_url);
        match self.host.post_issue_comment(&summary).await {
            Ok(()) => {
                outcome.summary_posted = true;
                tracing::info!(path = %file.path, "posted summary comment");
            }
            Err(e) => tracing::error!(path = %file.path, error = %e, "failed to post summary comment"),
        }

        if self.skip_comments {
            tracing::debug!(path = %file.path, "inline comments disabled");
            return outcome;
        }

        for comment in inline_comments(&file.path, &report.results, self.threshold) {
            match self.host.post_review_comment(&comment, self.commit_sha).await {
                Ok(()) => {
                    outcome.comments_posted += 1;
                    tracing::info!(
                        path = %comment.path,
                        line = comment.line,
                        commit = self.commit_sha,
                        "posted review comment"
                    );
                }
                Err(e) => {
                    outcome.comments_failed += 1;
                    tracing::warn!(
                        path = %comment.path,
                        line = comment.line,
                        error = %e,
                        "failed to post review comment"
                    );
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str, severity: &str, range: Option<&str>, status: FindingStatus) -> Finding {
        Finding {
            check_id: id.into(),
            severity: severity.into(),
            description: format!("{id} description"),
            file_line_range: range.map(str::to_string),
            status: Some(status),
        }
    }

    #[test]
    fn shared_range_becomes_one_comment_in_order() {
        let findings = vec![
            finding("CKV_1", "high", Some("10-20"), FindingStatus::Failed),
            finding("CKV_2", "low", Some("10-20"), FindingStatus::Failed),
        ];
        let comments = inline_comments("main.tf", &findings, None);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].line, 10);
        assert_eq!(
            comments[0].body,
            "* CKV_1 - high :orange_circle: - CKV_1 description\n\
             * CKV_2 - low :green_circle: - CKV_2 description"
        );
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let findings = vec![
            finding("A", "medium", Some("30-31"), FindingStatus::Failed),
            finding("B", "medium", Some("2-4"), FindingStatus::Failed),
            finding("C", "medium", Some("30-31"), FindingStatus::Failed),
        ];
        let comments = inline_comments("x.yaml", &findings, None);
        let lines: Vec<u64> = comments.iter().map(|c| c.line).collect();
        assert_eq!(lines, vec![30, 2]);
        assert_eq!(comments[0].body.lines().count(), 2);
    }

    #[test]
    fn threshold_high_excludes_medium() {
        let findings = vec![
            finding("CRIT", "critical", Some("1-2"), FindingStatus::Failed),
            finding("HIGH", "high", Some("3-4"), FindingStatus::Failed),
            finding("MED", "medium", Some("5-6"), FindingStatus::Failed),
        ];
        let comments = inline_comments("main.tf", &findings, Some(Severity::High));
        let bodies: Vec<&str> = comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(comments.len(), 2);
        assert!(bodies[0].contains("CRIT"));
        assert!(bodies[1].contains("HIGH"));
    }

    #[test]
    fn passed_and_rangeless_findings_are_skipped() {
        let findings = vec![
            finding("OK", "critical", Some("1-2"), FindingStatus::Passed),
            finding("NORANGE", "critical", None, FindingStatus::Failed),
        ];
        assert!(inline_comments("main.tf", &findings, None).is_empty());
    }

    #[test]
    fn unknown_severity_has_no_emoji() {
        let f = finding("X", "info", Some("7-7"), FindingStatus::Failed);
        assert!(is_commentable(&f, None));
        assert!(!is_commentable(&f, Some(Severity::Low)));
        let comments = inline_comments("main.tf", &[f], None);
        assert_eq!(comments[0].body, "* X - info - X description");
    }

    #[test]
    fn unknown_status_is_not_commented() {
        let f = finding("S", "critical", Some("3-3"), FindingStatus::Unknown);
        assert!(!is_commentable(&f, None));
    }

    #[test]
    fn bad_range_is_dropped() {
        let findings = vec![finding("A", "low", Some("n/a"), FindingStatus::Failed)];
        assert!(inline_comments("main.tf", &findings, None).is_empty());
    }

    #[test]
    fn summary_lists_every_count() {
        let summary = ScanSummary {
            file_name: "stack.ts".into(),
            summary_id: "s-1".into(),
            passed: 12,
            failed: 4,
            critical: 1,
            high: 2,
            medium: 0,
            low: 1,
        };
        let body = summary_comment(&summary, "https://app.example/results");
        assert!(body.contains("`stack.ts`"));
        assert!(body.contains("Passed Checks: 12"));
        assert!(body.contains("Failed Checks: 4"));
        assert!(body.contains("Critical Severity: 1"));
        assert!(body.contains("High Severity: 2"));
        assert!(body.contains("Medium Severity: 0"));
        assert!(body.contains("Low Severity: 1"));
        assert!(body.ends_with("https://app.example/results?id=s-1"));
    }
}
