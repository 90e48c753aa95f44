//! Stored file naming.

use std::path::Path;
use std::sync::Arc;

use super::Clock;
use crate::{FiledropError, Result};

/// Maximum length of a stored file name, in bytes.
pub const MAX_NAME_LENGTH: usize = 255;

/// Generates candidate names for uploads.
///
/// A name is the upload time in milliseconds since the Unix epoch followed by
/// the original extension, e.g. `1709290800000.txt`. Retries append a
/// disambiguator: `1709290800000-1.txt`. The allocator does not check the
/// bucket for existing entries; callers detect collisions when placing the
/// file.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    clock: Arc<dyn Clock>,
}

impl NameAllocator {
    /// Create an allocator reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Allocate a candidate name for `original_name`.
    ///
    /// `attempt` is zero for the first try; later attempts read a fresh
    /// timestamp and append `-{attempt}`.
    pub fn allocate(&self, original_name: &str, attempt: usize) -> String {
        let millis = self.clock.now().timestamp_millis();
        let ext = extract_extension(original_name);
        if attempt == 0 {
            format!("{millis}{ext}")
        } else {
            format!("{millis}-{attempt}{ext}")
        }
    }
}

/// Extension of a client-supplied filename, including the leading dot.
///
/// Returns an empty string when there is none. Clients may send full paths
/// with either separator, so only the last component is considered.
pub fn extract_extension(original_name: &str) -> &str {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);

    match Path::new(base).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() && !ext.chars().any(char::is_control) => {
            // extension() excludes the dot; widen the slice by one to keep it.
            &base[base.len() - ext.len() - 1..]
        }
        _ => "",
    }
}

/// Check that `name` can safely address a single entry inside a bucket.
///
/// Rejects empty names, path separators, `.`/`..`, hidden (dot-prefixed)
/// names which are reserved for in-flight uploads, control characters, and
/// names longer than [`MAX_NAME_LENGTH`].
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Err(FiledropError::Validation(format!("{reason}: {name:?}")));

    if name.is_empty() {
        return invalid("file name is empty");
    }
    if name.len() > MAX_NAME_LENGTH {
        return invalid("file name is too long");
    }
    if name.starts_with('.') {
        return invalid("file name must not start with a dot");
    }
    if name.contains(['/', '\\']) {
        return invalid("file name must not contain path separators");
    }
    if name.chars().any(char::is_control) {
        return invalid("file name must not contain control characters");
    }
    Ok(())
}
