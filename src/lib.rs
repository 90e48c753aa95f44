//! filedrop - a small file upload service.
//!
//! Uploads land in per-day directories under a single upload root, named by
//! upload time. A passcode-protected admin view can rename and delete them.

pub mod admin;
pub mod config;
pub mod datetime;
pub mod error;
pub mod logging;
pub mod storage;
pub mod web;

pub use admin::{AdminGate, AdminMutator, AdminToken};
pub use config::Config;
pub use error::{FiledropError, Result};
pub use storage::{BucketKey, FileRegistry, FileStore, Ingestor, StoredFile, UploadRequest};
pub use web::WebServer;
