//! Enumeration of stored files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::vec;

use super::bucket::bucket_dir;
use super::{validate_name, BucketKey, StoredFile};
use crate::{FiledropError, Result};

/// Lists stored files straight from disk.
///
/// Nothing is cached: every call re-reads the upload root, so results reflect
/// uploads, renames and deletes as soon as they complete.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    root: PathBuf,
}

impl FileRegistry {
    /// Create a registry over `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Enumerate all stored files.
    ///
    /// Buckets come in ascending date order and files within a bucket in
    /// lexicographic name order. Bucket contents are read lazily as the
    /// iteration reaches them. A missing root lists as empty.
    pub fn list(&self) -> Result<Listing> {
        let mut buckets = Vec::new();

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Listing::new(self.root.clone(), buckets));
            }
            Err(e) => return Err(e.into()),
        };

        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<BucketKey>().ok())
            else {
                continue;
            };
            buckets.push(key);
        }
        buckets.sort();

        Ok(Listing::new(self.root.clone(), buckets))
    }

    /// Look up a single stored file.
    pub fn get(&self, bucket: BucketKey, name: &str) -> Result<StoredFile> {
        validate_name(name)?;
        let path = bucket_dir(&self.root, bucket).join(name);

        match StoredFile::from_path(bucket, name, &path) {
            Ok(file) => Ok(file),
            Err(e)
                if e.kind() == io::ErrorKind::NotFound
                    || e.kind() == io::ErrorKind::InvalidInput =>
            {
                Err(FiledropError::NotFound(format!("{bucket}/{name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Root directory of the registry.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Lazy iterator over stored files, produced by [`FileRegistry::list`].
#[derive(Debug)]
pub struct Listing {
    root: PathBuf,
    buckets: vec::IntoIter<BucketKey>,
    current: Option<(BucketKey, vec::IntoIter<String>)>,
}

impl Listing {
    fn new(root: PathBuf, buckets: Vec<BucketKey>) -> Self {
        Self {
            root,
            buckets: buckets.into_iter(),
            current: None,
        }
    }
}

impl Iterator for Listing {
    type Item = StoredFile;

    fn next(&mut self) -> Option<StoredFile> {
        loop {
            if let Some((bucket, names)) = &mut self.current {
                let dir = bucket_dir(&self.root, *bucket);
                for name in names.by_ref() {
                    match StoredFile::from_path(*bucket, &name, &dir.join(&name)) {
                        Ok(file) => return Some(file),
                        // Removed since the directory was read, or not a file.
                        Err(e)
                            if e.kind() == io::ErrorKind::NotFound
                                || e.kind() == io::ErrorKind::InvalidInput => {}
                        Err(e) => {
                            tracing::warn!(
                                bucket = %bucket,
                                name = %name,
                                error = %e,
                                "Skipping unreadable entry"
                            );
                        }
                    }
                }
            }

            let bucket = self.buckets.next()?;
            let names = read_bucket_names(&bucket_dir(&self.root, bucket));
            self.current = Some((bucket, names.into_iter()));
        }
    }
}

/// Sorted names of the visible entries in a bucket directory.
///
/// A bucket that vanished or cannot be read yields no names.
fn read_bucket_names(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to read bucket");
            }
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, bucket: &str, name: &str, content: &[u8]) {
        let dir = root.join(bucket);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    fn ids(registry: &FileRegistry) -> Vec<String> {
        registry
            .list()
            .unwrap()
            .map(|f| format!("{}/{}", f.bucket, f.name))
            .collect()
    }

    #[test]
    fn test_list_empty_root() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileRegistry::new(temp_dir.path());
        assert_eq!(registry.list().unwrap().count(), 0);
    }

    #[test]
    fn test_list_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let registry = FileRegistry::new(temp_dir.path().join("missing"));
        assert_eq!(registry.list().unwrap().count(), 0);
    }

    #[test]
    fn test_list_orders_buckets_and_names() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "2024-03-01", "b.txt", b"b");
        write(root, "2024-03-01", "a.txt", b"a");
        write(root, "2023-12-31", "z.png", b"z");
        write(root, "2024-02-29", "m.bin", b"m");

        let registry = FileRegistry::new(root);
        assert_eq!(
            ids(&registry),
            vec![
                "2023-12-31/z.png",
                "2024-02-29/m.bin",
                "2024-03-01/a.txt",
                "2024-03-01/b.txt",
            ]
        );
    }

    #[test]
    fn test_list_skips_foreign_entries() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "2024-03-01", "a.txt", b"a");
        write(root, "2024-03-01", ".upload-inflight.part", b"partial");
        fs::create_dir_all(root.join("2024-03-01").join("nested")).unwrap();
        fs::write(root.join("stray.txt"), b"not in a bucket").unwrap();
        write(root, "not-a-date", "x.txt", b"x");

        let registry = FileRegistry::new(root);
        assert_eq!(ids(&registry), vec!["2024-03-01/a.txt"]);
    }

    #[test]
    fn test_list_tolerates_empty_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("2024-02-29")).unwrap();
        write(root, "2024-03-01", "a.txt", b"a");

        let registry = FileRegistry::new(root);
        assert_eq!(ids(&registry), vec!["2024-03-01/a.txt"]);
    }

    #[test]
    fn test_list_tolerates_concurrent_removal() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "2024-03-01", "a.txt", b"a");
        write(root, "2024-03-01", "b.txt", b"b");
        write(root, "2024-03-02", "c.txt", b"c");

        let registry = FileRegistry::new(root);
        let mut listing = registry.list().unwrap();

        let first = listing.next().unwrap();
        assert_eq!(first.name, "a.txt");

        // b.txt is already in the snapshot of the bucket; c's bucket is not read yet.
        fs::remove_file(root.join("2024-03-01").join("b.txt")).unwrap();
        fs::remove_dir_all(root.join("2024-03-02")).unwrap();

        assert!(listing.next().is_none());
    }

    #[test]
    fn test_list_is_restartable() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let registry = FileRegistry::new(root);

        assert!(ids(&registry).is_empty());
        write(root, "2024-03-01", "a.txt", b"a");
        assert_eq!(ids(&registry), vec!["2024-03-01/a.txt"]);
    }

    #[test]
    fn test_list_reports_sizes() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "2024-03-01", "a.txt", b"0123456789");

        let registry = FileRegistry::new(temp_dir.path());
        let files: Vec<_> = registry.list().unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 10);
    }

    #[test]
    fn test_get() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "2024-03-01", "a.txt", b"abc");
        let registry = FileRegistry::new(temp_dir.path());
        let bucket: BucketKey = "2024-03-01".parse().unwrap();

        let file = registry.get(bucket, "a.txt").unwrap();
        assert_eq!(file.size, 3);

        assert!(matches!(
            registry.get(bucket, "missing.txt"),
            Err(FiledropError::NotFound(_))
        ));
        assert!(matches!(
            registry.get(bucket, "../a.txt"),
            Err(FiledropError::Validation(_))
        ));
    }
}
