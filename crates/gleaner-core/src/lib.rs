pub mod aggregate;
pub mod config;
pub mod document;
pub mod error;
pub mod job;
pub mod normalize;
pub mod pipeline;
pub mod provision;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod store;

pub use aggregate::{export_columns, write_csv, ResultAggregator, RunSummary};
pub use config::{ConfigError, OutputConfig, PipelineConfig, ProcessingConfig, ServiceConfig};
pub use document::{discover_documents, DiscoveryError, DocumentDescriptor, SUPPORTED_EXTENSIONS};
pub use error::{Error, Result};
pub use job::{JobDescriptor, JobOutcome, JobRunner, JobState};
pub use normalize::{
    default_issuer_rules, BusinessCodeTable, CanonicalRecord, FieldNormalizer, IssuerRule,
    CANONICAL_FIELDS, UNCLASSIFIED,
};
pub use pipeline::{ExtractionPipeline, RunReport};
pub use provision::{load_template_ref, ProvisioningError, TemplateRef};
pub use retry::{ErrorClass, RetryError, RetryPolicy};
pub use scheduler::{BatchScheduler, JobCompletion};
pub use service::{
    classify_service_error, ExtractionClient, ExtractionResult, ExtractionStatus, FieldValue,
    HttpExtractionClient, JobHandle, PollResponse, ServiceError, ServiceResult,
};
pub use store::{split_bucket_uri, LocalStore, MemoryStore, ObjectRef, ObjectStore, StorageError};
