use std::path::Path;

use crate::document::DocumentDescriptor;
use crate::job::JobState;
use crate::normalize::{CanonicalRecord, CANONICAL_FIELDS};
use crate::store::{ObjectStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Artifact upload failed: {0}")]
    Upload(#[from] StorageError),
}

/// The fixed export header: document, the ten canonical fields, then the
/// three metadata columns.
#[must_use]
pub fn export_columns() -> Vec<&'static str> {
    let mut columns = vec!["document"];
    columns.extend_from_slice(CANONICAL_FIELDS);
    columns.extend_from_slice(&["s3_uri", "processing_status", "error_message"]);
    columns
}

/// Per-run outcome tallies for the end-of-run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl RunSummary {
    #[must_use]
    pub fn from_records(records: &[CanonicalRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.final_state {
                JobState::Succeeded => summary.succeeded += 1,
                JobState::TimedOut => summary.timed_out += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }
}

/// Buffers records arriving in completion order and restores discovery order
/// at export time. One row per discovered document, always.
pub struct ResultAggregator {
    documents: Vec<DocumentDescriptor>,
    slots: Vec<Option<CanonicalRecord>>,
}

impl ResultAggregator {
    #[must_use]
    pub fn new(documents: Vec<DocumentDescriptor>) -> Self {
        let slots = documents.iter().map(|_| None).collect();
        Self { documents, slots }
    }

    /// Record the outcome for the document at `index` (discovery order).
    /// The first record for a slot wins; duplicates are dropped.
    pub fn insert(&mut self, index: usize, record: CanonicalRecord) {
        match self.slots.get_mut(index) {
            Some(slot @ None) => *slot = Some(record),
            Some(_) => tracing::warn!(index, "duplicate record for document slot, keeping first"),
            None => tracing::error!(index, "record index out of range, dropping"),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Records in discovery order. Any slot left unfilled (a lost task)
    /// becomes an error row so the row-count invariant holds.
    #[must_use]
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.slots
            .into_iter()
            .zip(self.documents)
            .map(|(slot, document)| {
                slot.unwrap_or_else(|| {
                    CanonicalRecord::error(
                        &document,
                        JobState::Failed,
                        "job task produced no result".to_string(),
                    )
                })
            })
            .collect()
    }
}

/// Write the 14-column UTF-8 CSV artifact.
pub fn write_csv(records: &[CanonicalRecord], path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(export_columns())?;
    for record in records {
        writer.write_record(record.as_row())?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), rows = records.len(), "wrote CSV artifact");
    Ok(())
}

/// Upload the locally written artifact, returning its destination URI.
pub async fn upload_artifact(
    store: &dyn ObjectStore,
    location: &str,
    path: &Path,
) -> Result<String, ExportError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map_or_else(|| "results.csv".to_string(), |n| n.to_string_lossy().into_owned());

    let uri = store.put(location, &name, &bytes).await?;
    tracing::info!(%uri, "uploaded CSV artifact");
    Ok(uri)
}
