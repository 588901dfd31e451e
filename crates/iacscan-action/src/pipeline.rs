use std::fmt;
use std::time::Duration;

use iacscan_core::{ChangedFile, IacScanError, ScanConfig, Severity};
use serde::Serialize;

use crate::github::SourceHost;
use crate::poller::PollQueue;
use crate::report::Reporter;
use crate::scanner::{ScanService, UploadRequest};
use crate::selector::FileSelector;

/// Result of a completed scan run.
///
/// # Examples
///
/// ```
/// use iacscan_action::pipeline::RunOutcome;
///
/// let outcome = RunOutcome::default();
/// assert!(!outcome.failed);
/// assert!(outcome.unresolved.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    /// Files that passed selection, in pull request order.
    pub selected: Vec<String>,
    /// Files whose content fetch or upload failed.
    pub upload_failures: Vec<String>,
    /// Files with a terminal scan result.
    pub reported: Vec<ReportedFile>,
    /// Uploaded files that never produced a result within the budget.
    pub unresolved: Vec<String>,
    /// Poll cycles actually run.
    pub cycles_run: u32,
    /// Configured minimum severity, if any.
    pub minimum_severity: Option<Severity>,
    /// A reported summary breached the minimum severity.
    pub failed: bool,
}

/// Per-file reporting statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedFile {
    pub path: String,
    pub summary_id: String,
    pub breached: bool,
    pub comments_posted: usize,
    pub comments_failed: usize,
}

/// Scan orchestrator: select, upload, poll and report.
///
/// All calls are issued one after another; uploads finish before polling starts.
pub struct ScanPipeline<'a, H: SourceHost + ?Sized, S: ScanService + ?Sized> {
    host: &'a H,
    service: &'a S,
    config: ScanConfig,
    report_url: String,
}

impl<'a, H: SourceHost + ?Sized, S: ScanService + ?Sized> ScanPipeline<'a, H, S> {
    /// Create a pipeline over a source host and a scanning service.
    pub fn new(host: &'a H, service: &'a S, config: ScanConfig, report_url: impl Into<String>) -> Self {
        Self {
            host,
            service,
            config,
            report_url: report_url.into(),
        }
    }

    /// Run the whole workflow once.
    ///
    /// # Errors
    ///
    /// Returns [`IacScanError::Host`] if the pull request or its file list
    /// cannot be resolved. Per-file failures are recorded in the outcome.
    pub async fn run(&self) -> Result<RunOutcome, IacScanError> {
        let head = self.host.pull_request_head().await?;
        let changed = self.host.changed_files(&head).await?;

        let mut outcome = RunOutcome {
            minimum_severity: self.config.minimum_severity,
            ..RunOutcome::default()
        };

        let selected = FileSelector::from_config(&self.config).select(&changed);
        outcome.selected = selected.iter().map(|f| f.path.clone()).collect();
        tracing::info!(
            changed = changed.len(),
            selected = selected.len(),
            "selected files for scanning"
        );
        if selected.is_empty() {
            return Ok(outcome);
        }

        let mut uploaded = Vec::with_capacity(selected.len());
        for file in selected {
            match self.upload(&file).await {
                Ok(()) => {
                    tracing::info!(path = %file.path, "uploaded");
                    uploaded.push(file);
                }
                Err(e) => {
                    tracing::error!(path = %file.path, error = %e, "upload failed, skipping file");
                    outcome.upload_failures.push(file.path);
                }
            }
        }

        let reporter = Reporter::new(
            self.host,
            &head.sha,
            &self.report_url,
            self.config.minimum_severity,
            self.config.skip_comments,
        );
        let interval = self.config.poll_interval();
        let cycles = self.config.poll_cycles();
        let mut queue = PollQueue::new(uploaded);

        for cycle in 1..=cycles {
            if queue.is_empty() {
                break;
            }
            wait(interval).await;
            outcome.cycles_run = cycle;
            tracing::info!(
                cycle,
                cycles,
                waited_secs = interval.as_secs() * u64::from(cycle),
                outstanding = queue.len(),
                "polling scan results"
            );

            for (file, report) in queue.poll_cycle(self.service).await {
                let stats = reporter.report(&file, &report).await;
                outcome.failed |= stats.breached;
                outcome.reported.push(ReportedFile {
                    path: file.path,
                    summary_id: report.summary.summary_id,
                    breached: stats.breached,
                    comments_posted: stats.comments_posted,
                    comments_failed: stats.comments_failed,
                });
            }
        }

        outcome.unresolved = queue
            .into_remaining()
            .into_iter()
            .map(|f| f.path)
            .collect();
        if !outcome.unresolved.is_empty() {
            tracing::warn!(files = ?outcome.unresolved, "could not get scan results");
        }

        Ok(outcome)
    }

    async fn upload(&self, file: &ChangedFile) -> Result<(), IacScanError> {
        let content = self.host.file_content(file).await?;
        self.service.upload(&UploadRequest::new(file, &content)).await
    }
}

async fn wait(interval: Duration) {
    if !interval.is_zero() {
        tokio::time::sleep(interval).await;
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scan Results")?;
        writeln!(f, "============")?;
        writeln!(
            f,
            "Selected: {} | Upload failures: {} | Reported: {} | Unresolved: {} | Poll cycles: {}\n",
            self.selected.len(),
            self.upload_failures.len(),
            self.reported.len(),
            self.unresolved.len(),
            self.cycles_run,
        )?;

        if self.selected.is_empty() {
            writeln!(f, "No matching files changed.")?;
        }
        for r in &self.reported {
            let mark = if r.breached { "FAIL" } else { "ok" };
            writeln!(
                f,
                "[{mark}] {} (summary {}, {} comments, {} failed to post)",
                r.path, r.summary_id, r.comments_posted, r.comments_failed
            )?;
        }
        for path in &self.upload_failures {
            writeln!(f, "[upload failed] {path}")?;
        }
        for path in &self.unresolved {
            writeln!(f, "[no result] {path}")?;
        }

        match self.minimum_severity {
            Some(s) if self.failed => {
                writeln!(f, "\nFindings at or above '{s}' severity were reported.")?
            }
            Some(s) => writeln!(f, "\nNo findings at or above '{s}' severity.")?,
            None => writeln!(f, "\nNo minimum severity configured.")?,
        }
        Ok(())
    }
}
