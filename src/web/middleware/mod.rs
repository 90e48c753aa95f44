//! Middleware for the web server.

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod security;

pub use auth::{admin_cookie, PresentedToken, ADMIN_COOKIE};
pub use cors::create_cors_layer;
pub use rate_limit::{admin_login_rate_limit, get_client_ip, LoginRateLimiter};
pub use security::{reject_hidden_paths, security_headers};
