use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gleaner_core::{
    DiscoveryError, Error, ExtractionClient, ExtractionPipeline, ExtractionResult,
    ExtractionStatus, FieldValue, JobHandle, JobState, MemoryStore, ObjectStore, PipelineConfig,
    PollResponse, ServiceError, ServiceResult, TemplateRef,
};

/// Fake extraction service keyed on the document URI:
/// - `fail` documents report a service-side failure,
/// - `slow` documents never finish (they run into the job timeout),
/// - everything else succeeds after one `running` poll.
struct FakeService {
    submits: AtomicUsize,
}

impl FakeService {
    fn new() -> Self {
        Self {
            submits: AtomicUsize::new(0),
        }
    }

    fn result_for(uri: &str) -> ExtractionResult {
        let mut result = ExtractionResult::new();
        result.insert(
            "NameOnForm".into(),
            FieldValue::Scalar("Indiana Farm Bureau Insurance".into()),
        );
        result.insert("LOB".into(), FieldValue::Scalar("031-077".into()));
        result.insert("State".into(), FieldValue::Scalar("KY".into()));
        result.insert("Language".into(), FieldValue::Scalar("English".into()));
        result.insert("SiteOnForm".into(), FieldValue::Scalar(uri.to_string()));
        result
    }
}

#[async_trait::async_trait]
impl ExtractionClient for FakeService {
    async fn submit(&self, uri: &str, _template: &str) -> ServiceResult<JobHandle> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(JobHandle(uri.to_string()))
    }

    async fn poll(&self, handle: &JobHandle) -> ServiceResult<PollResponse> {
        if handle.0.contains("fail") {
            return Ok(PollResponse {
                status: ExtractionStatus::Failed,
                result: None,
                error: Some("document is password protected".into()),
            });
        }
        if handle.0.contains("slow") {
            return Ok(PollResponse {
                status: ExtractionStatus::Running,
                result: None,
                error: None,
            });
        }
        Ok(PollResponse {
            status: ExtractionStatus::Succeeded,
            result: Some(Self::result_for(&handle.0)),
            error: None,
        })
    }

    async fn cancel(&self, _handle: &JobHandle) -> ServiceResult<()> {
        Ok(())
    }
}

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert("inbox/01-good.pdf", b"%PDF".to_vec()).await;
    store.insert("inbox/02-fail.pdf", b"%PDF".to_vec()).await;
    store.insert("inbox/03-slow.png", b"PNG".to_vec()).await;
    store.insert("inbox/04-good.tif", b"II*".to_vec()).await;
    store.insert("inbox/ignored.docx", b"PK".to_vec()).await;
    store
}

fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.service.endpoint = "http://localhost:0".into();
    config.processing.batch_size = 2;
    config.processing.max_retries = 1;
    config.processing.retry_delay = 0;
    config.processing.poll_interval = 1;
    config.processing.timeout = 3;
    config.output.csv_filename = "results.csv".into();
    config.output.include_timestamp = false;
    config
}

fn pipeline(store: MemoryStore, client: Arc<FakeService>) -> ExtractionPipeline {
    ExtractionPipeline::new(
        Arc::new(store),
        client,
        test_config(),
        TemplateRef::new("tpl-test"),
    )
}

#[tokio::test(start_paused = true)]
async fn full_run_yields_one_row_per_document() {
    let store = seeded_store().await;
    let client = Arc::new(FakeService::new());
    let tmp = tempfile::tempdir().unwrap();

    let report = pipeline(store.clone(), Arc::clone(&client))
        .run("inbox", "outbox", tmp.path(), false)
        .await
        .unwrap();

    // Four supported documents, one row each, in discovery order.
    assert_eq!(report.records.len(), 4);
    let names: Vec<&str> = report.records.iter().map(|r| r.document.as_str()).collect();
    assert_eq!(
        names,
        vec!["01-good.pdf", "02-fail.pdf", "03-slow.png", "04-good.tif"]
    );

    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.timed_out, 1);

    // Normalization applied: issuer override beats the extracted state.
    let good = &report.records[0];
    assert_eq!(good.state, "IN");
    assert_eq!(good.lob, "Homeowners");
    assert_eq!(good.processing_status, "success");

    // Failures are data, not aborts.
    let failed = &report.records[1];
    assert_eq!(failed.processing_status, "error");
    assert_eq!(failed.error_message, "document is password protected");
    assert_eq!(failed.final_state, JobState::Failed);

    let slow = &report.records[2];
    assert_eq!(slow.final_state, JobState::TimedOut);
    assert!(slow.error_message.contains("timeout"));

    // Local artifact exists and was uploaded.
    let path = report.artifact_path.unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 5);

    let uploaded = report.uploaded_uri.unwrap();
    assert_eq!(uploaded, "outbox/results.csv");
    let listed = store.list("outbox").await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dry_run_submits_nothing() {
    let store = seeded_store().await;
    let client = Arc::new(FakeService::new());
    let tmp = tempfile::tempdir().unwrap();

    let report = pipeline(store, Arc::clone(&client))
        .run("inbox", "outbox", tmp.path(), true)
        .await
        .unwrap();

    assert_eq!(report.summary.total, 4);
    assert!(report.records.is_empty());
    assert!(report.artifact_path.is_none());
    assert_eq!(client.submits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_input_is_fatal_for_live_runs() {
    let store = MemoryStore::new();
    store.insert("inbox/readme.txt", b"-".to_vec()).await;
    let client = Arc::new(FakeService::new());
    let tmp = tempfile::tempdir().unwrap();

    let result = pipeline(store, client)
        .run("inbox", "outbox", tmp.path(), false)
        .await;

    assert!(matches!(
        result,
        Err(Error::Discovery(DiscoveryError::Empty(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn reruns_are_deterministic() {
    let client = Arc::new(FakeService::new());
    let tmp = tempfile::tempdir().unwrap();

    let first = pipeline(seeded_store().await, Arc::clone(&client))
        .with_upload(false)
        .run("inbox", "outbox", tmp.path().join("a").as_path(), false)
        .await
        .unwrap();
    let second = pipeline(seeded_store().await, Arc::clone(&client))
        .with_upload(false)
        .run("inbox", "outbox", tmp.path().join("b").as_path(), false)
        .await
        .unwrap();

    assert_eq!(first.records, second.records);
}

/// Transient submit failures burn retries but never more than the budget.
struct FlakySubmit {
    failures_left: AtomicUsize,
    submits: AtomicUsize,
}

#[async_trait::async_trait]
impl ExtractionClient for FlakySubmit {
    async fn submit(&self, uri: &str, _template: &str) -> ServiceResult<JobHandle> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(ServiceError::Transient("throttled".into()));
        }
        Ok(JobHandle(uri.to_string()))
    }

    async fn poll(&self, _handle: &JobHandle) -> ServiceResult<PollResponse> {
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

#[tokio::test(start_paused = true)]
async fn submission_retry_budget_is_exact() {
    let store = MemoryStore::new();
    store.insert("inbox/only.pdf", b"%PDF".to_vec()).await;

    let client = Arc::new(FlakySubmit {
        failures_left: AtomicUsize::new(usize::MAX),
        submits: AtomicUsize::new(0),
    });

    let tmp = tempfile::tempdir().unwrap();
    let report = ExtractionPipeline::new(
        Arc::new(store),
        client.clone(),
        test_config(),
        TemplateRef::new("tpl-test"),
    )
    .with_upload(false)
    .run("inbox", "outbox", tmp.path(), false)
    .await
    .unwrap();

    // max_retries = 1: exactly one initial attempt plus one retry.
    assert_eq!(client.submits.load(Ordering::SeqCst), 2);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].final_state, JobState::Failed);
}
