use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Transient storage failure: {0}")]
    Transient(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Reference to a single stored object, as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Full addressable URI of the object.
    pub uri: String,
    /// Key relative to the listed location.
    pub key: String,
}

/// Read/write access to an object location (bucket prefix or directory).
///
/// Implementations must return listings in an order that is stable within a
/// single call; the pipeline's output ordering is derived from it.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list(&self, location: &str) -> StorageResult<Vec<ObjectRef>>;

    async fn get(&self, reference: &ObjectRef) -> StorageResult<Vec<u8>>;

    /// Write `bytes` under `name` at `location`, returning the object's URI.
    async fn put(&self, location: &str, name: &str, bytes: &[u8]) -> StorageResult<String>;
}

/// Split an `s3://bucket/prefix` style URI into bucket and prefix.
///
/// A bare `bucket` or `bucket/prefix` string is accepted as well, matching
/// what operators commonly paste on the command line.
#[must_use]
pub fn split_bucket_uri(uri: &str) -> (String, String) {
    let trimmed = uri.strip_prefix("s3://").unwrap_or(uri);
    match trimmed.split_once('/') {
        Some((bucket, prefix)) => (bucket.to_string(), prefix.to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Directory-backed store for local runs and development.
pub struct LocalStore;

impl LocalStore {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn classify_io(err: std::io::Error, path: &Path) -> StorageError {
        match err.kind() {
            std::io::ErrorKind::NotFound => {
                StorageError::NotFound(path.to_string_lossy().into_owned())
            }
            std::io::ErrorKind::PermissionDenied => {
                StorageError::AccessDenied(path.to_string_lossy().into_owned())
            }
            _ => StorageError::Io(err),
        }
    }

    async fn collect_files(root: &Path, dir: PathBuf, out: &mut Vec<ObjectRef>) -> StorageResult<()> {
        let mut pending = vec![dir];

        while let Some(current) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current)
                .await
                .map_err(|e| Self::classify_io(e, &current))?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(root) {
                    out.push(ObjectRef {
                        uri: path.to_string_lossy().into_owned(),
                        key: relative.to_string_lossy().into_owned(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalStore {
    async fn list(&self, location: &str) -> StorageResult<Vec<ObjectRef>> {
        let root = PathBuf::from(location);
        let mut objects = Vec::new();
        Self::collect_files(&root, root.clone(), &mut objects).await?;
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn get(&self, reference: &ObjectRef) -> StorageResult<Vec<u8>> {
        let path = PathBuf::from(&reference.uri);
        tokio::fs::read(&path)
            .await
            .map_err(|e| Self::classify_io(e, &path))
    }

    async fn put(&self, location: &str, name: &str, bytes: &[u8]) -> StorageResult<String> {
        let dir = PathBuf::from(location);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Self::classify_io(e, &dir))?;
        let path = dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Self::classify_io(e, &path))?;
        Ok(path.to_string_lossy().into_owned())
    }
}

/// In-memory store. Backing for unit and integration tests.
#[derive(Default, Clone)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects.write().await.insert(key.into(), bytes.into());
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, location: &str) -> StorageResult<Vec<ObjectRef>> {
        let objects = self.objects.read().await;
        let prefix = location.trim_end_matches('/');
        let refs: Vec<ObjectRef> = objects
            .keys()
            .filter(|key| prefix.is_empty() || key.starts_with(prefix))
            .map(|key| ObjectRef {
                uri: key.clone(),
                key: key
                    .strip_prefix(prefix)
                    .map_or_else(|| key.clone(), |rest| rest.trim_start_matches('/').to_string()),
            })
            .collect();
        Ok(refs)
    }

    async fn get(&self, reference: &ObjectRef) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&reference.uri)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(reference.uri.clone()))
    }

    async fn put(&self, location: &str, name: &str, bytes: &[u8]) -> StorageResult<String> {
        let uri = format!("{}/{}", location.trim_end_matches('/'), name);
        self.objects.write().await.insert(uri.clone(), bytes.to_vec());
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_bucket_uri() {
        assert_eq!(
            split_bucket_uri("s3://docs/incoming/forms"),
            ("docs".into(), "incoming/forms".into())
        );
        assert_eq!(split_bucket_uri("s3://docs"), ("docs".into(), String::new()));
        assert_eq!(split_bucket_uri("docs/forms"), ("docs".into(), "forms".into()));
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.insert("inbox/a.pdf", b"pdf bytes".to_vec()).await;

        let listed = store.list("inbox").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "a.pdf");

        let bytes = store.get(&listed[0]).await.unwrap();
        assert_eq!(bytes, b"pdf bytes");
    }

    #[tokio::test]
    async fn test_memory_store_missing_object() {
        let store = MemoryStore::new();
        let reference = ObjectRef {
            uri: "inbox/missing.pdf".into(),
            key: "missing.pdf".into(),
        };

        assert!(matches!(
            store.get(&reference).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_store_list_and_put() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(tmp.path().join("b.pdf"), b"b").unwrap();
        std::fs::write(nested.join("a.png"), b"a").unwrap();

        let store = LocalStore::new();
        let listed = store.list(tmp.path().to_str().unwrap()).await.unwrap();
        let keys: Vec<&str> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["b.pdf", "nested/a.png"]);

        let uri = store
            .put(tmp.path().to_str().unwrap(), "out.csv", b"header")
            .await
            .unwrap();
        assert!(std::path::Path::new(&uri).exists());
    }

    #[tokio::test]
    async fn test_local_store_missing_dir() {
        let store = LocalStore::new();
        let result = store.list("/definitely/not/a/real/dir").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
