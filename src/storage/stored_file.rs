//! Stored file references.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::BucketKey;
use crate::datetime::from_system_time;

/// A file stored in a bucket, identified by `(bucket, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Bucket the file lives in.
    pub bucket: BucketKey,
    /// Name of the file within its bucket.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Absolute path on disk.
    #[serde(skip)]
    pub path: PathBuf,
}

impl StoredFile {
    /// Read the metadata of the file at `path`.
    ///
    /// Fails with `NotFound` if the entry is gone and with `InvalidInput` if
    /// it is not a regular file.
    pub(crate) fn from_path(bucket: BucketKey, name: &str, path: &Path) -> io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        // Birth time is not available on every filesystem.
        let created = metadata.created().or_else(|_| metadata.modified())?;

        Ok(Self {
            bucket,
            name: name.to_string(),
            size: metadata.len(),
            created_at: from_system_time(created),
            path: path.to_path_buf(),
        })
    }

    /// Extension of the stored name, including the dot (empty if none).
    pub fn extension(&self) -> &str {
        super::extract_extension(&self.name)
    }

    /// URL path under which the file is served, e.g. `/uploads/2024-03-01/1709290800000.txt`.
    pub fn url_path(&self) -> String {
        format!(
            "/uploads/{}/{}",
            self.bucket,
            urlencoding::encode(&self.name)
        )
    }

    /// Absolute URL of the file under `base_url`.
    pub fn public_url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.url_path())
    }

    /// MIME type guessed from the extension.
    pub fn content_type(&self) -> String {
        mime_guess::from_path(&self.name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}
