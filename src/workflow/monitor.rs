use super::client::OrchestrationClient;
use super::{SubmissionRef, SubmissionStatus, WorkflowError, WorkflowSnapshot};
use crate::credentials::TokenProvider;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Holds the latest snapshot of one submission and refreshes it on demand.
pub struct WorkflowMonitor {
    client: OrchestrationClient,
    tokens: Arc<dyn TokenProvider>,
    submission: SubmissionRef,
    snapshot: Option<WorkflowSnapshot>,
}

impl WorkflowMonitor {
    pub fn new(client: OrchestrationClient, tokens: Arc<dyn TokenProvider>, submission: SubmissionRef) -> Self {
        Self {
            client,
            tokens,
            submission,
            snapshot: None,
        }
    }

    pub fn submission(&self) -> &SubmissionRef {
        &self.submission
    }

    /// Refetch the submission, replacing the previous snapshot.
    pub async fn update(&mut self) -> Result<&WorkflowSnapshot, WorkflowError> {
        let token = self.tokens.token().await?;
        let snapshot = self.client.fetch_submission(&token, &self.submission).await?;
        let snapshot: &WorkflowSnapshot = self.snapshot.insert(snapshot);
        Ok(snapshot)
    }

    /// The latest snapshot, fetching it only if none has been fetched yet.
    pub async fn snapshot(&mut self) -> Result<&WorkflowSnapshot, WorkflowError> {
        match self.snapshot {
            Some(ref s) => Ok(s),
            None => self.update().await,
        }
    }

    pub fn latest(&self) -> Option<&WorkflowSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn status(&self) -> Option<SubmissionStatus> {
        self.snapshot.as_ref().map(WorkflowSnapshot::status)
    }

    /// Whether the latest snapshot is queued, submitted, or running.
    /// Does not refetch; false if nothing has been fetched.
    pub fn is_in_process(&self) -> bool {
        self.status().map_or(false, |s| s.is_in_process())
    }
}

/// Poll until the submission leaves the in-process states.
///
/// Blocks for as long as the submission stays in process; there is no
/// timeout. Any fetch failure ends the wait with an error.
pub async fn wait_for_completion<W: Write>(
    monitor: &mut WorkflowMonitor,
    poll_interval: Duration,
    out: &mut W,
) -> Result<SubmissionStatus, WorkflowError> {
    monitor.snapshot().await?;

    while let Some(status) = monitor.status().filter(SubmissionStatus::is_in_process) {
        writeln!(out, "Submission status: {}", status)?;
        writeln!(out, "Sleeping for {} seconds ...", poll_interval.as_secs_f64())?;
        out.flush()?;
        tokio::time::sleep(poll_interval).await;
        writeln!(out, "Getting current submission status ... ")?;
        monitor.update().await?;
    }

    let status = monitor
        .status()
        .unwrap_or_else(|| SubmissionStatus::Other(String::new()));
    info!(submission = %monitor.submission().submission_id, %status, "Submission finished");
    writeln!(out, "Final Submission status: {}", status)?;
    Ok(status)
}
