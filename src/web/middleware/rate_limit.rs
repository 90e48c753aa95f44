//! Rate limiting for admin passcode attempts.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    num::NonZeroU32,
    sync::{Arc, RwLock},
    time::Duration,
};

/// Per-IP rate limiter using Governor.
pub type IpRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-IP limits on passcode submissions.
#[derive(Clone)]
pub struct LoginRateLimiter {
    limiters: Arc<RwLock<HashMap<String, Arc<IpRateLimiter>>>>,
    /// Attempts allowed per minute.
    per_minute: u32,
    /// Key clients by `X-Forwarded-For`/`X-Real-IP` instead of the peer address.
    trust_proxy_headers: bool,
}

impl std::fmt::Debug for LoginRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRateLimiter")
            .field("per_minute", &self.per_minute)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish_non_exhaustive()
    }
}

impl LoginRateLimiter {
    /// Create a limiter allowing `per_minute` attempts per client.
    pub fn new(per_minute: u32) -> Self {
        Self {
            limiters: Arc::new(RwLock::new(HashMap::new())),
            per_minute,
            trust_proxy_headers: false,
        }
    }

    /// Take the client address from proxy headers. Only enable this when
    /// every request arrives through a proxy that sets them.
    pub fn trusting_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    fn limiter_for(&self, ip: &str) -> Arc<IpRateLimiter> {
        {
            let read_guard = self.limiters.read().unwrap_or_else(|e| e.into_inner());
            if let Some(limiter) = read_guard.get(ip) {
                return limiter.clone();
            }
        }

        let mut write_guard = self.limiters.write().unwrap_or_else(|e| e.into_inner());

        // Another request may have inserted it meanwhile.
        if let Some(limiter) = write_guard.get(ip) {
            return limiter.clone();
        }

        let quota = Quota::per_minute(NonZeroU32::new(self.per_minute).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        write_guard.insert(ip.to_string(), limiter.clone());
        limiter
    }

    /// Whether another attempt from `ip` is allowed right now.
    pub fn check(&self, ip: &str) -> bool {
        self.limiter_for(ip).check().is_ok()
    }

    /// Drop limiters nobody holds a reference to.
    pub fn cleanup(&self) {
        let mut guard = self.limiters.write().unwrap_or_else(|e| e.into_inner());
        guard.retain(|_, v| Arc::strong_count(v) > 1);
    }

    /// Number of clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.limiters.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await;
                self.cleanup();
            }
        });
    }
}

/// Extract client IP from request.
///
/// Forwarding headers are client-controlled, so they are consulted only when
/// `trust_proxy_headers` is set; otherwise the peer address is used.
pub fn get_client_ip(req: &Request<Body>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = proxy_client_ip(req) {
            return ip;
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

fn proxy_client_ip(req: &Request<Body>) -> Option<String> {
    if let Some(forwarded) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        // First hop is the client.
        if let Some(ip) = forwarded.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    req.headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Rate limiting middleware for the admin passcode form.
pub async fn admin_login_rate_limit(
    limiter: Arc<LoginRateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = get_client_ip(&req, limiter.trust_proxy_headers);

    if !limiter.check(&ip) {
        tracing::warn!(ip = %ip, "Admin login rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many passcode attempts. Please try again later.",
        )
            .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_rate_limit() {
        let limiter = LoginRateLimiter::new(3);

        assert!(limiter.check("127.0.0.1"));
        assert!(limiter.check("127.0.0.1"));
        assert!(limiter.check("127.0.0.1"));
        assert!(!limiter.check("127.0.0.1"));

        // Other clients keep their own budget.
        assert!(limiter.check("192.168.1.1"));
    }

    #[test]
    fn test_zero_limit_still_allows_one() {
        let limiter = LoginRateLimiter::new(0);
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_cleanup_drops_idle_limiters() {
        let limiter = LoginRateLimiter::new(5);
        limiter.check("1.1.1.1");
        limiter.check("2.2.2.2");
        assert_eq!(limiter.tracked(), 2);

        limiter.cleanup();
        assert_eq!(limiter.tracked(), 0);
    }

    fn request_from(peer: &str, header: (&str, &str)) -> Request<Body> {
        let mut req = Request::builder()
            .header(header.0, header.1)
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[test]
    fn test_client_ip_ignores_headers_by_default() {
        let req = request_from("192.0.2.10:4000", ("X-Forwarded-For", "203.0.113.7"));
        assert_eq!(get_client_ip(&req, false), "192.0.2.10");

        let req = request_from("192.0.2.10:4000", ("X-Real-IP", "198.51.100.2"));
        assert_eq!(get_client_ip(&req, false), "192.0.2.10");
    }

    #[test]
    fn test_client_ip_from_trusted_headers() {
        let req = request_from(
            "10.0.0.1:4000",
            ("X-Forwarded-For", "203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(get_client_ip(&req, true), "203.0.113.7");

        let req = request_from("10.0.0.1:4000", ("X-Real-IP", "198.51.100.2"));
        assert_eq!(get_client_ip(&req, true), "198.51.100.2");

        // No forwarding header: fall back to the peer.
        let req = request_from("10.0.0.1:4000", ("Accept", "*/*"));
        assert_eq!(get_client_ip(&req, true), "10.0.0.1");
    }

    #[test]
    fn test_client_ip_from_connect_info() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        let addr: SocketAddr = "192.0.2.10:4000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(get_client_ip(&req, false), "192.0.2.10");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(get_client_ip(&req, false), "unknown");
    }

    #[tokio::test]
    async fn test_spoofed_header_does_not_reset_budget() {
        use axum::{middleware, routing::get, Router};
        use tower::util::ServiceExt;

        let limiter = Arc::new(LoginRateLimiter::new(1));
        let app = Router::new()
            .route("/", get(|| async { "OK" }))
            .layer(middleware::from_fn(move |req, next| {
                admin_login_rate_limit(limiter.clone(), req, next)
            }));

        let first = app
            .clone()
            .oneshot(request_from("192.0.2.10:4000", ("X-Forwarded-For", "1.1.1.1")))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(request_from("192.0.2.10:4000", ("X-Forwarded-For", "2.2.2.2")))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
