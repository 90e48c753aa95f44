//! HTTP handlers.

pub mod admin;
pub mod upload;

pub use admin::{admin_delete, admin_login, admin_page, admin_rename};
pub use upload::{index, upload};

use std::sync::Arc;

use axum::http::{header::ACCEPT, HeaderMap};

use crate::admin::{AdminGate, AdminMutator};
use crate::datetime::BucketZone;
use crate::storage::{FileRegistry, FileStore, Ingestor, StoredFile};

use super::error::ApiError;
use super::middleware::LoginRateLimiter;

/// Display format for upload times in HTML pages.
const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shared state of the web handlers.
#[derive(Debug)]
pub struct AppState {
    /// Stores new uploads.
    pub ingestor: Ingestor,
    /// Lists and looks up stored files.
    pub registry: FileRegistry,
    /// Checks the admin passcode and tokens.
    pub gate: AdminGate,
    /// Renames and deletes stored files.
    pub mutator: AdminMutator,
    /// Calendar for displayed times.
    pub zone: BucketZone,
    /// Base URL used to build absolute file URLs.
    pub public_url: String,
    /// Maximum upload size in bytes.
    pub max_upload_size: usize,
    /// Limits passcode attempts per client.
    pub login_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    /// Build the handler state over an opened store.
    pub fn new(store: &FileStore, gate: AdminGate, public_url: impl Into<String>) -> Self {
        Self {
            ingestor: store.ingestor(),
            registry: store.registry(),
            mutator: AdminMutator::new(store.root()),
            zone: store.zone(),
            gate,
            public_url: public_url.into(),
            max_upload_size: 10 * 1024 * 1024,
            login_limiter: Arc::new(LoginRateLimiter::new(5)),
        }
    }

    /// Set the maximum upload size in bytes.
    pub fn with_max_upload_size(mut self, bytes: usize) -> Self {
        self.max_upload_size = bytes;
        self
    }

    /// Set the number of passcode attempts allowed per client and minute.
    pub fn with_login_rate_limit(mut self, per_minute: u32) -> Self {
        self.login_limiter = Arc::new(LoginRateLimiter::new(per_minute));
        self
    }

    /// Replace the passcode attempt limiter.
    pub fn with_login_limiter(mut self, limiter: LoginRateLimiter) -> Self {
        self.login_limiter = Arc::new(limiter);
        self
    }

    /// Rows for every stored file, oldest bucket first.
    pub(crate) async fn file_rows(&self) -> Result<Vec<FileRow>, ApiError> {
        let registry = self.registry.clone();
        let files = run_blocking(move || Ok(registry.list()?.collect::<Vec<_>>())).await?;
        Ok(files.iter().map(|f| FileRow::new(f, self.zone)).collect())
    }
}

/// Run blocking filesystem work off the async runtime.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| {
            tracing::error!("Blocking task failed: {}", e);
            ApiError::internal("An internal error occurred")
        })?
        .map_err(ApiError::from)
}

/// A stored file as shown in the HTML pages.
#[derive(Debug, Clone)]
pub struct FileRow {
    pub bucket: String,
    pub name: String,
    pub url: String,
    pub size: u64,
    pub created: String,
    pub content_type: String,
}

impl FileRow {
    fn new(file: &StoredFile, zone: BucketZone) -> Self {
        Self {
            bucket: file.bucket.to_string(),
            name: file.name.clone(),
            url: file.url_path(),
            size: file.size,
            created: zone.format(file.created_at, DISPLAY_TIME_FORMAT),
            content_type: file.content_type(),
        }
    }
}

/// Whether the client prefers an HTML page over JSON.
pub(crate) fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/html"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FixedClock;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_wants_html() {
        let mut headers = HeaderMap::new();
        assert!(!wants_html(&headers));

        headers.insert(ACCEPT, "application/json".parse().unwrap());
        assert!(!wants_html(&headers));

        headers.insert(
            ACCEPT,
            "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8".parse().unwrap(),
        );
        assert!(wants_html(&headers));
    }

    #[tokio::test]
    async fn test_file_rows() {
        let temp_dir = TempDir::new().unwrap();
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap();
        let zone = BucketZone::parse("UTC").unwrap();
        let store =
            FileStore::open(temp_dir.path(), zone, Arc::new(FixedClock::new(now))).unwrap();
        let state = AppState::new(&store, AdminGate::new("p", b"s", 60), "http://x");

        assert!(state.file_rows().await.unwrap().is_empty());

        store
            .ingestor()
            .ingest(crate::storage::UploadRequest::new("a b.txt", b"hi".to_vec()))
            .unwrap();

        let rows = state.file_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bucket, "2024-03-01");
        assert_eq!(rows[0].name, "1709290800000.txt");
        assert_eq!(rows[0].url, "/uploads/2024-03-01/1709290800000.txt");
        assert_eq!(rows[0].size, 2);
        assert_eq!(rows[0].content_type, "text/plain");
    }
}
