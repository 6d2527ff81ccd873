use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::ErrorClass;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Transient service failure: {0}")]
    Transient(String),
    #[error("Permanent service failure: {0}")]
    Permanent(String),
    #[error("Malformed service response: {0}")]
    Malformed(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Retryable/terminal predicate for [`ServiceError`], used by the retry
/// policy around submission and polling.
#[must_use]
pub fn classify_service_error(err: &ServiceError) -> ErrorClass {
    match err {
        ServiceError::Transient(_) => ErrorClass::Retryable,
        ServiceError::Permanent(_) | ServiceError::Malformed(_) => ErrorClass::Terminal,
    }
}

/// Opaque identifier for a submitted extraction job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle(pub String);

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// Raw extracted value for one field: absent, scalar, or multi-valued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    Many(Vec<String>),
}

impl FieldValue {
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Scalar(v) => vec![v.as_str()],
            Self::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// Field-name to value(s) map returned by the service for a succeeded job.
pub type ExtractionResult = HashMap<String, FieldValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResponse {
    pub status: ExtractionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Client for the asynchronous extraction service.
///
/// `submit` must be safe to repeat for the same document; the document URI is
/// the natural idempotency key.
#[async_trait::async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn submit(&self, document_uri: &str, template: &str) -> ServiceResult<JobHandle>;

    async fn poll(&self, handle: &JobHandle) -> ServiceResult<PollResponse>;

    /// Best-effort cancellation; callers ignore the outcome.
    async fn cancel(&self, handle: &JobHandle) -> ServiceResult<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    input_uri: &'a str,
    template_ref: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    job_id: String,
}

/// HTTP implementation of [`ExtractionClient`].
pub struct HttpExtractionClient {
    base_url: url::Url,
    inner: reqwest::Client,
}

impl HttpExtractionClient {
    pub fn new(endpoint: &str) -> ServiceResult<Self> {
        let base_url = url::Url::parse(endpoint)
            .map_err(|e| ServiceError::Permanent(format!("invalid endpoint {endpoint}: {e}")))?;

        let inner = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ServiceError::Permanent(e.to_string()))?;

        Ok(Self { base_url, inner })
    }

    fn job_url(&self, path: &str) -> ServiceResult<url::Url> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::Permanent(format!("invalid job path {path}: {e}")))
    }

    fn classify_transport(err: &reqwest::Error) -> ServiceError {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            ServiceError::Transient(err.to_string())
        } else {
            ServiceError::Permanent(err.to_string())
        }
    }

    fn classify_status(status: reqwest::StatusCode, body: String) -> ServiceError {
        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
        {
            ServiceError::Transient(format!("HTTP {status}: {body}"))
        } else {
            ServiceError::Permanent(format!("HTTP {status}: {body}"))
        }
    }

    async fn check(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::classify_status(status, body))
    }
}

#[async_trait::async_trait]
impl ExtractionClient for HttpExtractionClient {
    async fn submit(&self, document_uri: &str, template: &str) -> ServiceResult<JobHandle> {
        let request = SubmitRequest {
            input_uri: document_uri,
            template_ref: template,
        };

        let response = self
            .inner
            .post(self.job_url("v1/jobs")?)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        let body: SubmitResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        tracing::debug!(document_uri, job_id = %body.job_id, "submitted extraction job");
        Ok(JobHandle(body.job_id))
    }

    async fn poll(&self, handle: &JobHandle) -> ServiceResult<PollResponse> {
        let response = self
            .inner
            .get(self.job_url(&format!("v1/jobs/{handle}"))?)
            .send()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))
    }

    async fn cancel(&self, handle: &JobHandle) -> ServiceResult<()> {
        let response = self
            .inner
            .post(self.job_url(&format!("v1/jobs/{handle}/cancel"))?)
            .send()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        Self::check(response).await.map(|_| ())
    }
}
