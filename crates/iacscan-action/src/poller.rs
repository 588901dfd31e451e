//! Outstanding uploads and the per-cycle result query.

use iacscan_core::{ChangedFile, ScanReport};

use crate::scanner::{PollOutcome, ResultQuery, ScanService};

/// Uploaded files still waiting for a terminal scan result, in upload order.
///
/// Files only ever leave the queue; a finished file is never queried again.
///
/// # Examples
///
/// ```
/// use iacscan_action::poller::PollQueue;
/// use iacscan_core::ChangedFile;
///
/// let queue = PollQueue::new(vec![ChangedFile::new("main.tf", "sha")]);
/// assert_eq!(queue.len(), 1);
/// assert!(!queue.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PollQueue {
    files: Vec<ChangedFile>,
}

impl PollQueue {
    pub fn new(files: Vec<ChangedFile>) -> Self {
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files still outstanding.
    pub fn files(&self) -> &[ChangedFile] {
        &self.files
    }

    /// Consume the queue, returning whatever is still outstanding.
    pub fn into_remaining(self) -> Vec<ChangedFile> {
        self.files
    }

    /// Query every outstanding file once, in order.
    ///
    /// Files with a terminal result are removed and returned with their
    /// report. Pending answers and request errors leave the file queued.
    pub async fn poll_cycle<S: ScanService + ?Sized>(
        &mut self,
        service: &S,
    ) -> Vec<(ChangedFile, ScanReport)> {
        let mut ready = Vec::new();
        let mut remaining = Vec::with_capacity(self.files.len());

        for file in std::mem::take(&mut self.files) {
            tracing::debug!(path = %file.path, "querying scan result");
            match service.fetch_result(&ResultQuery::for_file(&file)).await {
                Ok(PollOutcome::Ready(report)) => ready.push((file, report)),
                Ok(PollOutcome::Pending(msg)) => {
                    tracing::debug!(path = %file.path, msg = ?msg, "scan not finished");
                    remaining.push(file);
                }
                Err(e) => {
                    tracing::debug!(path = %file.path, error = %e, "result query failed, will retry");
                    remaining.push(file);
                }
            }
        }

        self.files = remaining;
        ready
    }
}
