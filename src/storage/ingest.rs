//! Upload ingestion.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use tempfile::{Builder, NamedTempFile};

use super::{validate_name, Clock, NameAllocator, Partitioner, StoredFile};
use crate::{FiledropError, Result};

/// Maximum number of names tried for one upload before giving up.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 8;

/// Prefix of in-flight upload files. Hidden from listings.
const TEMP_PREFIX: &str = ".upload-";

/// An incoming upload.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Filename supplied by the client. Only its extension is kept.
    pub original_name: Option<String>,
    /// Declared content type. Recorded for logging only.
    pub content_type: Option<String>,
    /// File content, `None` if the request carried no file field.
    pub content: Option<Vec<u8>>,
}

impl UploadRequest {
    /// Build a request for a named file.
    pub fn new(original_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            original_name: Some(original_name.into()),
            content_type: None,
            content: Some(content.into()),
        }
    }

    /// Set the declared content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Writes uploads into their date bucket.
#[derive(Debug, Clone)]
pub struct Ingestor {
    partitioner: Partitioner,
    allocator: NameAllocator,
    clock: Arc<dyn Clock>,
}

impl Ingestor {
    /// Create an ingestor.
    pub fn new(partitioner: Partitioner, allocator: NameAllocator, clock: Arc<dyn Clock>) -> Self {
        Self {
            partitioner,
            allocator,
            clock,
        }
    }

    /// Store an upload and return the resulting file.
    ///
    /// The content is written to a hidden temporary file in the target bucket
    /// and then linked into place under a freshly allocated name without
    /// replacing existing entries. If the name is taken the next candidate
    /// is tried, up to [`MAX_ALLOCATION_ATTEMPTS`] times. The temporary file
    /// is removed on every failure path.
    ///
    /// An extension that makes the stored name unusable (too long for a
    /// file name) is rejected with `Validation` before anything is written.
    pub fn ingest(&self, request: UploadRequest) -> Result<StoredFile> {
        let original_name = request.original_name.unwrap_or_default();
        let content = request.content.ok_or(FiledropError::MissingFile)?;
        // Browsers submit an empty, unnamed part when no file was chosen.
        if original_name.is_empty() && content.is_empty() {
            return Err(FiledropError::MissingFile);
        }

        // The last attempt yields the longest candidate.
        check_candidate(&self.allocator.allocate(&original_name, MAX_ALLOCATION_ATTEMPTS - 1))?;

        let now = self.clock.now();
        let (bucket, dir) = self.partitioner.resolve_bucket(now)?;

        let mut temp = write_temp(&dir, &content).map_err(|e| {
            tracing::error!(bucket = %bucket, error = %e, "Failed to write upload");
            FiledropError::StorageWriteFailed(e.to_string())
        })?;

        for attempt in 0..MAX_ALLOCATION_ATTEMPTS {
            let name = self.allocator.allocate(&original_name, attempt);
            let path = dir.join(&name);

            match temp.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::info!(
                        bucket = %bucket,
                        name = %name,
                        size = content.len(),
                        content_type = request.content_type.as_deref().unwrap_or("unknown"),
                        "Stored upload"
                    );
                    return Ok(StoredFile {
                        bucket,
                        name,
                        size: content.len() as u64,
                        created_at: now,
                        path,
                    });
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(bucket = %bucket, name = %name, "Name taken, retrying");
                    temp = e.file;
                }
                Err(e) => {
                    tracing::error!(bucket = %bucket, name = %name, error = %e.error, "Failed to place upload");
                    return Err(FiledropError::StorageWriteFailed(e.error.to_string()));
                }
            }
        }

        tracing::error!(bucket = %bucket, "Exhausted name allocation attempts");
        Err(FiledropError::AllocationExhausted(MAX_ALLOCATION_ATTEMPTS))
    }
}

/// Reject a candidate name that cannot address a bucket entry.
fn check_candidate(name: &str) -> Result<()> {
    validate_name(name).map_err(|e| {
        tracing::warn!(error = %e, "Rejected upload name");
        e
    })
}

/// Write `content` to a new temporary file in `dir` and flush it to disk.
fn write_temp(dir: &Path, content: &[u8]) -> io::Result<NamedTempFile> {
    let mut temp = Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".part")
        .tempfile_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}
