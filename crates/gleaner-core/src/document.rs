use serde::{Deserialize, Serialize};

use crate::store::{ObjectStore, StorageError};

/// File extensions the extraction service accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tiff", "tif"];

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Input location unreachable: {0}")]
    Unreachable(#[from] StorageError),
    #[error("No supported documents found at {0}")]
    Empty(String),
}

/// One candidate input document. Immutable after discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub source_uri: String,
    pub filename: String,
    pub extension: String,
}

impl DocumentDescriptor {
    #[must_use]
    pub fn from_key(uri: String, key: &str) -> Option<Self> {
        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        let extension = filename.rsplit('.').next()?.to_ascii_lowercase();
        if filename.len() == extension.len() {
            // No dot at all.
            return None;
        }
        Some(Self {
            source_uri: uri,
            filename,
            extension,
        })
    }

    #[must_use]
    pub fn is_supported(&self) -> bool {
        SUPPORTED_EXTENSIONS.contains(&self.extension.as_str())
    }
}

/// List `location` and keep objects with a supported extension.
///
/// Ordering follows the store's listing order. With `require_documents` set,
/// an empty result is an error; dry runs pass `false` so an empty inbox only
/// reports zero documents.
pub async fn discover_documents(
    store: &dyn ObjectStore,
    location: &str,
    require_documents: bool,
) -> Result<Vec<DocumentDescriptor>, DiscoveryError> {
    let objects = store.list(location).await?;

    let documents: Vec<DocumentDescriptor> = objects
        .into_iter()
        .filter_map(|obj| DocumentDescriptor::from_key(obj.uri, &obj.key))
        .filter(DocumentDescriptor::is_supported)
        .collect();

    tracing::info!(
        location,
        count = documents.len(),
        "discovered candidate documents"
    );

    if documents.is_empty() && require_documents {
        return Err(DiscoveryError::Empty(location.to_string()));
    }

    Ok(documents)
}
