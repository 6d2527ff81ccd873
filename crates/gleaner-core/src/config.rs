use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::normalize::{default_issuer_rules, IssuerRule};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot parse config file {path}: {source}")]
    Unparsable {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the extraction service.
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum number of concurrently in-flight jobs.
    pub batch_size: usize,
    /// Additional attempts for retryable submit/poll failures.
    pub max_retries: u32,
    /// Base delay of the retry backoff, in seconds.
    pub retry_delay: u64,
    /// Seconds between status polls.
    pub poll_interval: u64,
    /// Per-job wall-clock timeout, in seconds.
    pub timeout: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_retries: 3,
            retry_delay: 2,
            poll_interval: 15,
            timeout: 600,
        }
    }
}

impl ProcessingConfig {
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv_filename: String,
    /// Suffix the filename with `_YYYYmmdd_HHMMSS` before the extension.
    pub include_timestamp: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_filename: "extraction_results.csv".to_string(),
            include_timestamp: true,
        }
    }
}

impl OutputConfig {
    /// Effective artifact filename for this run.
    #[must_use]
    pub fn filename(&self, now: chrono::DateTime<chrono::Local>) -> String {
        if !self.include_timestamp {
            return self.csv_filename.clone();
        }
        let stamp = now.format("%Y%m%d_%H%M%S");
        match self.csv_filename.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}_{stamp}.{ext}"),
            None => format!("{}_{stamp}", self.csv_filename),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Jurisdiction overrides, consulted in order. First match wins.
    pub issuer_rules: Vec<IssuerRule>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            issuer_rules: default_issuer_rules(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub service: ServiceConfig,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
    pub normalizer: NormalizerConfig,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Unparsable {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.processing.poll_interval == 0 {
            return Err(ConfigError::Invalid("poll_interval must be at least 1 second".into()));
        }
        if self.processing.timeout == 0 {
            return Err(ConfigError::Invalid("timeout must be at least 1 second".into()));
        }
        if self.normalizer.issuer_rules.iter().any(|r| r.state_code.len() != 2) {
            return Err(ConfigError::Invalid(
                "issuer rule state codes must be 2-letter".into(),
            ));
        }
        Ok(())
    }

    /// Like [`Self::validate`], additionally requiring a service endpoint —
    /// a live run cannot submit anywhere without one.
    pub fn validate_for_run(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.service.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("service.endpoint is required".into()));
        }
        Ok(())
    }
}
