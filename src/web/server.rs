//! Web server for filedrop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::admin::AdminGate;
use crate::config::{Config, ServerConfig};
use crate::datetime::BucketZone;
use crate::storage::{Clock, FileStore};
use crate::{FiledropError, Result};

use super::handlers::AppState;
use super::middleware::LoginRateLimiter;
use super::router::create_router;

/// Web server for uploads and the admin pages.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Server configuration.
    server_config: ServerConfig,
}

impl WebServer {
    /// Create a web server from configuration.
    ///
    /// Opens (and creates) the upload root. Without a configured token
    /// secret a random one is generated, so admin tokens do not survive a
    /// restart.
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| FiledropError::Config(format!("invalid server address: {e}")))?;

        let zone = BucketZone::parse(&config.storage.timezone)?;
        let store = FileStore::open(&config.storage.upload_root, zone, clock)?;

        let secret = if config.admin.token_secret.is_empty() {
            tracing::warn!("No admin token secret configured, generating a random one");
            rand::random::<[u8; 32]>().to_vec()
        } else {
            config.admin.token_secret.as_bytes().to_vec()
        };
        let gate = AdminGate::new(
            config.admin.passcode.clone(),
            &secret,
            config.admin.token_expiry_secs,
        );

        let app_state = AppState::new(&store, gate, config.server.public_url.clone())
            .with_max_upload_size(config.storage.max_upload_size_bytes())
            .with_login_limiter(
                LoginRateLimiter::new(config.admin.login_rate_limit)
                    .trusting_proxy_headers(config.server.trust_proxy_headers),
            );

        tracing::info!(
            root = %store.root().display(),
            timezone = %config.storage.timezone,
            "Upload storage ready"
        );

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            server_config: config.server.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn into_router(self) -> Router {
        self.app_state.login_limiter.clone().start_cleanup_task();
        create_router(self.app_state, &self.server_config).layer(CompressionLayer::new())
    }

    /// Run the web server.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.into_router();

        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.into_router();

        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
