use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::document::DocumentDescriptor;
use crate::job::{JobRunner, JobState};
use crate::normalize::{CanonicalRecord, FieldNormalizer};

/// Emitted once per finished document, in completion order.
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub index: usize,
    pub filename: String,
    pub state: JobState,
}

/// Runs job state machines under a concurrency bound.
///
/// The semaphore permit is acquired before each task is spawned, so the
/// bound is the batch's only admission control: at most `batch_size` jobs
/// are in flight whatever the input size.
pub struct BatchScheduler {
    runner: Arc<JobRunner>,
    normalizer: Arc<FieldNormalizer>,
    template: String,
    batch_size: usize,
    dry_run: bool,
}

impl BatchScheduler {
    #[must_use]
    pub fn new(
        runner: JobRunner,
        normalizer: FieldNormalizer,
        template: String,
        batch_size: usize,
    ) -> Self {
        Self {
            runner: Arc::new(runner),
            normalizer: Arc::new(normalizer),
            template,
            batch_size: batch_size.max(1),
            dry_run: false,
        }
    }

    /// In dry-run mode documents are listed but no job is ever started.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Process every document, returning one record per document tagged with
    /// its discovery index. Arrival order follows completion, not discovery.
    pub async fn run(
        &self,
        documents: Vec<DocumentDescriptor>,
        progress: Option<mpsc::UnboundedSender<JobCompletion>>,
    ) -> Vec<(usize, CanonicalRecord)> {
        if self.dry_run {
            for document in &documents {
                tracing::info!(document = %document.filename, "dry run: would submit");
            }
            tracing::info!(total = documents.len(), "dry run complete, nothing submitted");
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.batch_size));
        let mut tasks: JoinSet<(usize, CanonicalRecord)> = JoinSet::new();
        let total = documents.len();

        tracing::info!(total, batch_size = self.batch_size, "starting batch");

        for (index, document) in documents.into_iter().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                // The semaphore is never closed while scheduling.
                break;
            };

            let runner = Arc::clone(&self.runner);
            let normalizer = Arc::clone(&self.normalizer);
            let template = self.template.clone();
            let progress = progress.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let filename = document.filename.clone();
                let outcome = runner.run(document, &template).await;
                let record = normalizer.record(&outcome);

                if let Some(sender) = progress {
                    let _ = sender.send(JobCompletion {
                        index,
                        filename,
                        state: record.final_state,
                    });
                }
                (index, record)
            });
        }

        let mut completed = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => completed.push(entry),
                Err(err) => {
                    // A panicked task loses its index; the aggregator fills
                    // the hole with an error row at export time.
                    tracing::error!(error = %err, "job task aborted");
                }
            }
        }

        tracing::info!(completed = completed.len(), total, "batch finished");
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::service::{
        ExtractionClient, ExtractionResult, ExtractionStatus, JobHandle, PollResponse,
        ServiceResult,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn docs(n: usize) -> Vec<DocumentDescriptor> {
        (0..n)
            .map(|i| DocumentDescriptor {
                source_uri: format!("inbox/doc-{i}.pdf"),
                filename: format!("doc-{i}.pdf"),
                extension: "pdf".to_string(),
            })
            .collect()
    }

    /// Tracks the high-water mark of concurrently in-flight jobs.
    struct GaugeClient {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GaugeClient {
        fn new() -> Self {
            Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ExtractionClient for GaugeClient {
        async fn submit(&self, uri: &str, _template: &str) -> ServiceResult<JobHandle> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            Ok(JobHandle(uri.to_string()))
        }

        async fn poll(&self, _handle: &JobHandle) -> ServiceResult<PollResponse> {
            // Hold the slot across one poll interval before finishing.
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(PollResponse {
                status: ExtractionStatus::Succeeded,
                result: Some(ExtractionResult::new()),
                error: None,
            })
        }

        async fn cancel(&self, _handle: &JobHandle) -> ServiceResult<()> {
            Ok(())
        }
    }

    fn scheduler(client: Arc<GaugeClient>, batch_size: usize) -> BatchScheduler {
        let runner = JobRunner::new(
            client,
            RetryPolicy::no_delay(1),
            Duration::from_millis(1),
            Duration::from_secs(30),
        );
        BatchScheduler::new(
            runner,
            FieldNormalizer::with_bundled_table(),
            "tpl-1".to_string(),
            batch_size,
        )
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_batch_size() {
        let client = Arc::new(GaugeClient::new());
        let results = scheduler(Arc::clone(&client), 3).run(docs(12), None).await;

        assert_eq!(results.len(), 12);
        assert!(client.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_every_document_yields_a_record() {
        let client = Arc::new(GaugeClient::new());
        let mut results = scheduler(client, 4).run(docs(7), None).await;

        results.sort_by_key(|(index, _)| *index);
        let indices: Vec<usize> = results.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let client = Arc::new(GaugeClient::new());
        let results = scheduler(Arc::clone(&client), 4)
            .with_dry_run(true)
            .run(docs(6), None)
            .await;

        assert!(results.is_empty());
        assert_eq!(client.peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_progress_event_per_document() {
        let client = Arc::new(GaugeClient::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler(client, 2).run(docs(5), Some(tx)).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|e| e.state == JobState::Succeeded));
    }
}
