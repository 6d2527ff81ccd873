use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::document::DocumentDescriptor;
use crate::retry::{RetryError, RetryPolicy};
use crate::service::{
    classify_service_error, ExtractionClient, ExtractionResult, ExtractionStatus, JobHandle,
};

/// Lifecycle of a single extraction job. Transitions are monotonic; the
/// three terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Submitted,
    InProgress,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable bookkeeping for one job, owned by the runner driving it.
#[derive(Debug)]
pub struct JobDescriptor {
    pub document: DocumentDescriptor,
    pub request_id: Option<JobHandle>,
    pub attempt_count: u32,
    pub submitted_at: Option<Instant>,
    pub deadline: Option<Instant>,
    state: JobState,
}

impl JobDescriptor {
    #[must_use]
    pub fn new(document: DocumentDescriptor) -> Self {
        Self {
            document,
            request_id: None,
            attempt_count: 0,
            submitted_at: None,
            deadline: None,
            state: JobState::Pending,
        }
    }

    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    /// Advance to `next`. Ignored (with a warning) if already terminal.
    pub fn advance(&mut self, next: JobState) {
        if self.state.is_terminal() {
            tracing::warn!(
                document = %self.document.filename,
                current = %self.state,
                attempted = %next,
                "ignoring transition out of terminal state"
            );
            return;
        }
        self.state = next;
    }
}

/// Final result of one job run. Always produced, never an error: failures
/// are carried as data so one document cannot abort the batch.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub document: DocumentDescriptor,
    pub state: JobState,
    pub result: Option<ExtractionResult>,
    pub error: Option<String>,
}

impl JobOutcome {
    fn failed(document: DocumentDescriptor, state: JobState, error: String) -> Self {
        Self {
            document,
            state,
            result: None,
            error: Some(error),
        }
    }
}

/// Drives one document through submit → poll → terminal.
pub struct JobRunner {
    client: Arc<dyn ExtractionClient>,
    policy: RetryPolicy,
    poll_interval: Duration,
    timeout: Duration,
}

impl JobRunner {
    #[must_use]
    pub fn new(
        client: Arc<dyn ExtractionClient>,
        policy: RetryPolicy,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            policy,
            poll_interval,
            timeout,
        }
    }

    pub async fn run(&self, document: DocumentDescriptor, template: &str) -> JobOutcome {
        let mut job = JobDescriptor::new(document);

        let handle = match self.submit(&mut job, template).await {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(
                    document = %job.document.filename,
                    error = %err,
                    "submission failed"
                );
                job.advance(JobState::Failed);
                return JobOutcome::failed(
                    job.document,
                    JobState::Failed,
                    format!("submission failed: {err}"),
                );
            }
        };

        self.poll_until_terminal(&mut job, &handle).await
    }

    async fn submit(
        &self,
        job: &mut JobDescriptor,
        template: &str,
    ) -> Result<JobHandle, RetryError<crate::service::ServiceError>> {
        let uri = job.document.source_uri.clone();
        let attempts = std::sync::atomic::AtomicU32::new(0u32);

        let handle = self
            .policy
            .execute(
                || {
                    attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    self.client.submit(&uri, template)
                },
                classify_service_error,
            )
            .await?;

        job.attempt_count = attempts.load(std::sync::atomic::Ordering::SeqCst);
        job.request_id = Some(handle.clone());
        let now = Instant::now();
        job.submitted_at = Some(now);
        job.deadline = Some(now + self.timeout);
        job.advance(JobState::Submitted);

        tracing::debug!(
            document = %job.document.filename,
            handle = %handle,
            "job submitted"
        );
        Ok(handle)
    }

    async fn poll_until_terminal(&self, job: &mut JobDescriptor, handle: &JobHandle) -> JobOutcome {
        // Deadline is always set by a successful submit.
        let deadline = job.deadline.unwrap_or_else(Instant::now);

        loop {
            if Instant::now() >= deadline {
                return self.timed_out(job, handle).await;
            }

            let response = self
                .policy
                .execute(|| self.client.poll(handle), classify_service_error)
                .await;

            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    job.advance(JobState::Failed);
                    return JobOutcome::failed(
                        job.document.clone(),
                        JobState::Failed,
                        format!("status polling failed: {err}"),
                    );
                }
            };

            match response.status {
                ExtractionStatus::Queued => {}
                ExtractionStatus::Running => job.advance(JobState::InProgress),
                ExtractionStatus::Succeeded => {
                    job.advance(JobState::Succeeded);
                    return JobOutcome {
                        document: job.document.clone(),
                        state: JobState::Succeeded,
                        result: response.result,
                        error: None,
                    };
                }
                ExtractionStatus::Failed => {
                    job.advance(JobState::Failed);
                    let reason = response
                        .error
                        .unwrap_or_else(|| "service reported failure without detail".to_string());
                    return JobOutcome::failed(job.document.clone(), JobState::Failed, reason);
                }
            }

            let next_poll = Instant::now() + self.poll_interval;
            tokio::time::sleep_until(next_poll.min(deadline)).await;
        }
    }

    async fn timed_out(&self, job: &mut JobDescriptor, handle: &JobHandle) -> JobOutcome {
        // Best effort only; TimedOut stands even if the cancel is lost.
        if let Err(err) = self.client.cancel(handle).await {
            tracing::warn!(
                document = %job.document.filename,
                handle = %handle,
                error = %err,
                "cancellation failed after timeout"
            );
        }

        job.advance(JobState::TimedOut);
        JobOutcome::failed(
            job.document.clone(),
            JobState::TimedOut,
            format!(
                "job exceeded timeout of {}s",
                self.timeout.as_secs()
            ),
        )
    }
}
