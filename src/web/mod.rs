//! Web interface for filedrop.
//!
//! Serves the upload form, the upload endpoint, the stored files themselves
//! and the passcode-protected admin pages.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
