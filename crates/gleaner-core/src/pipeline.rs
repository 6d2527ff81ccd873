use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::aggregate::{self, ResultAggregator, RunSummary};
use crate::config::PipelineConfig;
use crate::document::discover_documents;
use crate::job::JobRunner;
use crate::normalize::{CanonicalRecord, FieldNormalizer};
use crate::provision::TemplateRef;
use crate::retry::RetryPolicy;
use crate::scheduler::{BatchScheduler, JobCompletion};
use crate::service::ExtractionClient;
use crate::store::ObjectStore;
use crate::Result;

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct RunReport {
    pub records: Vec<CanonicalRecord>,
    pub summary: RunSummary,
    pub artifact_path: Option<PathBuf>,
    pub uploaded_uri: Option<String>,
}

/// End-to-end run: discovery → scheduling → normalization → export.
///
/// Collaborators come in through the builder so tests drive the whole
/// pipeline with in-memory doubles.
pub struct ExtractionPipeline {
    store: Arc<dyn ObjectStore>,
    client: Arc<dyn ExtractionClient>,
    config: PipelineConfig,
    template: TemplateRef,
    progress: Option<mpsc::UnboundedSender<JobCompletion>>,
    upload: bool,
}

impl ExtractionPipeline {
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        client: Arc<dyn ExtractionClient>,
        config: PipelineConfig,
        template: TemplateRef,
    ) -> Self {
        Self {
            store,
            client,
            config,
            template,
            progress: None,
            upload: true,
        }
    }

    /// Receive one [`JobCompletion`] per finished document.
    #[must_use]
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<JobCompletion>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Skip uploading the artifact after the local write.
    #[must_use]
    pub const fn with_upload(mut self, upload: bool) -> Self {
        self.upload = upload;
        self
    }

    /// Run the full pipeline. Fatal errors only; per-document failures are
    /// rows in the report.
    pub async fn run(
        &self,
        input_location: &str,
        output_location: &str,
        output_dir: &std::path::Path,
        dry_run: bool,
    ) -> Result<RunReport> {
        let documents =
            discover_documents(self.store.as_ref(), input_location, !dry_run).await?;

        let scheduler = self.build_scheduler().with_dry_run(dry_run);

        if dry_run {
            scheduler.run(documents.clone(), None).await;
            return Ok(RunReport {
                summary: RunSummary {
                    total: documents.len(),
                    ..RunSummary::default()
                },
                records: Vec::new(),
                artifact_path: None,
                uploaded_uri: None,
            });
        }

        let completed = scheduler.run(documents.clone(), self.progress.clone()).await;

        let mut aggregator = ResultAggregator::new(documents);
        for (index, record) in completed {
            aggregator.insert(index, record);
        }
        let records = aggregator.into_records();
        let summary = RunSummary::from_records(&records);

        let filename = self.config.output.filename(chrono::Local::now());
        let artifact_path = output_dir.join(filename);
        aggregate::write_csv(&records, &artifact_path).map_err(crate::Error::Export)?;

        let uploaded_uri = if self.upload {
            let uri =
                aggregate::upload_artifact(self.store.as_ref(), output_location, &artifact_path)
                    .await
                    .map_err(crate::Error::Export)?;
            Some(uri)
        } else {
            None
        };

        Ok(RunReport {
            records,
            summary,
            artifact_path: Some(artifact_path),
            uploaded_uri,
        })
    }

    fn build_scheduler(&self) -> BatchScheduler {
        let processing = &self.config.processing;
        let policy = RetryPolicy::new(processing.max_retries, processing.retry_delay());
        let runner = JobRunner::new(
            Arc::clone(&self.client),
            policy,
            processing.poll_interval(),
            processing.timeout(),
        );
        let normalizer = FieldNormalizer::new(
            crate::normalize::BusinessCodeTable::bundled(),
            self.config.normalizer.issuer_rules.clone(),
        );

        BatchScheduler::new(
            runner,
            normalizer,
            self.template.as_str().to_string(),
            processing.batch_size,
        )
    }
}
