//! Security headers middleware.

use axum::{
    body::Body,
    http::{header, header::HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Security headers middleware.
///
/// Adds `X-Content-Type-Options`, `X-Frame-Options` and `Referrer-Policy` to
/// every response. Admin pages also get `Cache-Control: no-store` since they
/// carry tokens; stored files keep whatever caching the file service sets.
pub async fn security_headers(req: Request<Body>, next: Next) -> Response {
    let is_admin = req.uri().path().starts_with("/admin");
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if is_admin && !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        );
    }

    response
}

/// Answer 404 for any path segment naming a hidden entry.
///
/// In-flight uploads are dot-prefixed files inside the buckets; they must
/// not be reachable through the file service. Segments are checked after
/// percent-decoding, as the file service decodes them too.
pub async fn reject_hidden_paths(req: Request<Body>, next: Next) -> Response {
    let hidden = req.uri().path().split('/').any(|segment| {
        match urlencoding::decode(segment) {
            Ok(decoded) => decoded.starts_with('.'),
            Err(_) => true,
        }
    });

    if hidden {
        return StatusCode::NOT_FOUND.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::util::ServiceExt;

    async fn dummy_handler() -> &'static str {
        "OK"
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(dummy_handler))
            .route("/admin", get(dummy_handler))
            .layer(middleware::from_fn(security_headers))
    }

    #[tokio::test]
    async fn test_security_headers_added() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(
            headers.get("Referrer-Policy").unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert!(headers.get("Cache-Control").is_none());
    }

    async fn hidden_status(path: &str) -> StatusCode {
        let app = Router::new()
            .route("/*path", get(dummy_handler))
            .layer(middleware::from_fn(reject_hidden_paths));

        app.oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_hidden_paths_rejected() {
        assert_eq!(
            hidden_status("/2024-03-01/.upload-abc.part").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            hidden_status("/2024-03-01/%2Eupload-abc.part").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(hidden_status("/.hidden/x.txt").await, StatusCode::NOT_FOUND);
        assert_eq!(
            hidden_status("/2024-03-01/1709290800000.txt").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_admin_pages_not_cached() {
        let response = app()
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("Cache-Control").unwrap(),
            "no-store, max-age=0"
        );
    }
}
