//! Date buckets.
//!
//! Every upload lands in a directory named after the calendar date on which
//! it arrived:
//! ```text
//! {upload_root}/
//! ├── 2024-02-29/
//! │   └── 1709236800000.png
//! └── 2024-03-01/
//!     ├── 1709290800000.txt
//!     └── 1709290800000-1.txt
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};

use crate::datetime::BucketZone;
use crate::{FiledropError, Result};

const BUCKET_FORMAT: &str = "%Y-%m-%d";

/// Key of a bucket: a calendar date rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey(NaiveDate);

impl BucketKey {
    /// Bucket key for a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The calendar date of this bucket.
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(BUCKET_FORMAT))
    }
}

impl FromStr for BucketKey {
    type Err = FiledropError;

    /// Parse a canonical key. Non-canonical spellings such as `2024-3-1` are
    /// rejected so that a key always maps to exactly one directory.
    fn from_str(s: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(s, BUCKET_FORMAT)
            .map_err(|_| FiledropError::Validation(format!("invalid bucket: {s}")))?;
        let key = Self(date);
        if key.to_string() != s {
            return Err(FiledropError::Validation(format!("invalid bucket: {s}")));
        }
        Ok(key)
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Maps instants to bucket directories under the upload root.
#[derive(Debug, Clone)]
pub struct Partitioner {
    root: PathBuf,
    zone: BucketZone,
}

impl Partitioner {
    /// Create a partitioner for `root`, computing dates in `zone`.
    pub fn new(root: impl Into<PathBuf>, zone: BucketZone) -> Self {
        Self {
            root: root.into(),
            zone,
        }
    }

    /// Bucket key for an instant.
    pub fn key_for(&self, now: DateTime<Utc>) -> BucketKey {
        BucketKey(self.zone.date_of(now))
    }

    /// Directory of a bucket. Does not touch the filesystem.
    pub fn bucket_path(&self, key: BucketKey) -> PathBuf {
        bucket_dir(&self.root, key)
    }

    /// Resolve the bucket for `now`, creating its directory if needed.
    ///
    /// Creating an existing bucket is not an error. Any other failure is
    /// reported as `StorageUnavailable`.
    pub fn resolve_bucket(&self, now: DateTime<Utc>) -> Result<(BucketKey, PathBuf)> {
        let key = self.key_for(now);
        let path = self.bucket_path(key);

        match fs::create_dir(&path) {
            Ok(()) => {
                tracing::debug!(bucket = %key, "Created bucket directory");
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => {}
            Err(e) => {
                tracing::error!(bucket = %key, error = %e, "Failed to create bucket directory");
                return Err(FiledropError::StorageUnavailable(format!(
                    "cannot create bucket {key}: {e}"
                )));
            }
        }

        Ok((key, path))
    }
}

/// Directory of `key` under `root`.
pub(crate) fn bucket_dir(root: &Path, key: BucketKey) -> PathBuf {
    root.join(key.to_string())
}
