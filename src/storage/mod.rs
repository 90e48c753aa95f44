//! Upload storage for filedrop.
//!
//! This module owns the upload root on disk:
//! - Date buckets, created lazily per calendar day
//! - Timestamp-based naming with collision retries
//! - Crash-safe writes (temporary file, then no-clobber link into place)
//! - Listing straight from the directory tree

mod bucket;
mod clock;
mod ingest;
mod naming;
mod registry;
mod stored_file;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use bucket::{BucketKey, Partitioner};
pub use clock::{Clock, FixedClock, SystemClock};
pub use ingest::{Ingestor, UploadRequest, MAX_ALLOCATION_ATTEMPTS};
pub use naming::{extract_extension, validate_name, NameAllocator, MAX_NAME_LENGTH};
pub use registry::{FileRegistry, Listing};
pub use stored_file::StoredFile;

pub(crate) use bucket::bucket_dir;

use crate::datetime::BucketZone;
use crate::{FiledropError, Result};

/// An opened upload root, handing out the storage components bound to it.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    zone: BucketZone,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// Open the upload root, creating it if it doesn't exist.
    pub fn open(root: impl Into<PathBuf>, zone: BucketZone, clock: Arc<dyn Clock>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            FiledropError::StorageUnavailable(format!(
                "cannot create upload root {}: {e}",
                root.display()
            ))
        })?;

        Ok(Self { root, zone, clock })
    }

    /// Upload root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Calendar used for bucket keys.
    pub fn zone(&self) -> BucketZone {
        self.zone
    }

    /// Bucket partitioner for this root.
    pub fn partitioner(&self) -> Partitioner {
        Partitioner::new(self.root.clone(), self.zone)
    }

    /// Upload ingestor for this root.
    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(
            self.partitioner(),
            NameAllocator::new(self.clock.clone()),
            self.clock.clone(),
        )
    }

    /// File registry for this root.
    pub fn registry(&self) -> FileRegistry {
        FileRegistry::new(self.root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("uploads");
        assert!(!root.exists());

        let store = FileStore::open(&root, BucketZone::Local, Arc::new(SystemClock)).unwrap();

        assert!(root.is_dir());
        assert_eq!(store.root(), root);
        assert_eq!(store.registry().root(), root);
    }

    #[test]
    fn test_open_fails_on_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("uploads");
        fs::write(&root, b"file").unwrap();

        let result = FileStore::open(&root, BucketZone::Local, Arc::new(SystemClock));
        assert!(matches!(result, Err(FiledropError::StorageUnavailable(_))));
    }

    #[test]
    fn test_upload_then_list_with_system_clock() {
        let temp_dir = TempDir::new().unwrap();
        let store =
            FileStore::open(temp_dir.path(), BucketZone::Local, Arc::new(SystemClock)).unwrap();

        let file = store
            .ingestor()
            .ingest(UploadRequest::new("photo.jpg", b"jpeg".to_vec()))
            .unwrap();

        let listed: Vec<_> = store.registry().list().unwrap().collect();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, file.name);
        assert!(file.name.ends_with(".jpg"));
    }
}
