//! Admin rename and delete.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::AdminToken;
use crate::storage::{bucket_dir, validate_name, BucketKey, StoredFile};
use crate::{FiledropError, Result};

/// Renames and deletes stored files on behalf of an authorized admin.
///
/// Every operation takes an [`AdminToken`]; there is no way to call them
/// without having passed the gate. Files are addressed by `(bucket, name)`
/// and any bucket may be modified.
#[derive(Debug, Clone)]
pub struct AdminMutator {
    root: PathBuf,
}

impl AdminMutator {
    /// Create a mutator over the upload root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Rename a file within its bucket.
    ///
    /// Fails with `NotFound` if the source is missing and with
    /// `NameConflict` if the target already exists; in both cases nothing is
    /// changed. The file is linked under the new name, which never replaces
    /// an existing entry, and only then unlinked under the old one. If the
    /// old name vanished in between (a concurrent delete or rename won), the
    /// new link is removed again and the rename reports `NotFound`.
    pub fn rename(
        &self,
        token: &AdminToken,
        bucket: BucketKey,
        old_name: &str,
        new_name: &str,
    ) -> Result<StoredFile> {
        validate_name(old_name)?;
        validate_name(new_name)?;

        let dir = bucket_dir(&self.root, bucket);
        let from = dir.join(old_name);
        let to = dir.join(new_name);

        if !is_stored_file(&from)? {
            return Err(not_found(bucket, old_name));
        }

        match fs::hard_link(&from, &to) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(FiledropError::NameConflict(format!("{bucket}/{new_name}")));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(not_found(bucket, old_name));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = fs::remove_file(&from) {
            // Drop the new link so the file is not left under both names.
            if let Err(undo) = fs::remove_file(&to) {
                if undo.kind() != io::ErrorKind::NotFound {
                    tracing::error!(
                        bucket = %bucket,
                        name = %new_name,
                        error = %undo,
                        "Failed to undo rename link"
                    );
                }
            }
            return Err(if e.kind() == io::ErrorKind::NotFound {
                not_found(bucket, old_name)
            } else {
                e.into()
            });
        }

        tracing::info!(
            jti = %token.claims().jti,
            bucket = %bucket,
            from = %old_name,
            to = %new_name,
            "Renamed stored file"
        );

        StoredFile::from_path(bucket, new_name, &to).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                not_found(bucket, new_name)
            } else {
                e.into()
            }
        })
    }

    /// Delete a file.
    ///
    /// Deleting a missing file reports `NotFound`, so a repeated delete is
    /// distinguishable from the one that removed the file.
    pub fn delete(&self, token: &AdminToken, bucket: BucketKey, name: &str) -> Result<()> {
        validate_name(name)?;
        let path = bucket_dir(&self.root, bucket).join(name);

        if !is_stored_file(&path)? {
            return Err(not_found(bucket, name));
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(
                    jti = %token.claims().jti,
                    bucket = %bucket,
                    name = %name,
                    "Deleted stored file"
                );
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(not_found(bucket, name)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether `path` is an existing regular file.
fn is_stored_file(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn not_found(bucket: BucketKey, name: &str) -> FiledropError {
    FiledropError::NotFound(format!("{bucket}/{name}"))
}
