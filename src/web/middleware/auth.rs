//! Admin token extraction.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::convert::Infallible;

/// Name of the cookie holding the admin token.
pub const ADMIN_COOKIE: &str = "filedrop_admin";

/// Admin token sent in the request headers, if any.
///
/// Looks at `Authorization: Bearer <token>` first, then the admin cookie.
/// Form handlers check their own `token` field before falling back to this.
#[derive(Debug, Clone, Default)]
pub struct PresentedToken(pub Option<String>);

impl PresentedToken {
    /// Prefer `form_token` when present and non-empty.
    pub fn or_form(self, form_token: Option<String>) -> Option<String> {
        form_token.filter(|t| !t.is_empty()).or(self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for PresentedToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if bearer.is_some() {
            return Ok(PresentedToken(bearer));
        }

        let cookie = CookieJar::from_headers(&parts.headers)
            .get(ADMIN_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty());

        Ok(PresentedToken(cookie))
    }
}

/// Cookie carrying an admin token, scoped to the admin pages.
pub fn admin_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((ADMIN_COOKIE, token.to_string()))
        .path("/admin")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, Request};

    async fn extract(request: Request<()>) -> PresentedToken {
        let (mut parts, _) = request.into_parts();
        PresentedToken::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_bearer_header() {
        let request = Request::builder()
            .header(AUTHORIZATION, "Bearer abc.def.ghi")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.0.as_deref(), Some("abc.def.ghi"));
    }

    #[tokio::test]
    async fn test_cookie() {
        let request = Request::builder()
            .header(COOKIE, format!("other=1; {ADMIN_COOKIE}=tok"))
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.0.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_bearer_wins_over_cookie() {
        let request = Request::builder()
            .header(AUTHORIZATION, "Bearer from-header")
            .header(COOKIE, format!("{ADMIN_COOKIE}=from-cookie"))
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.0.as_deref(), Some("from-header"));
    }

    #[tokio::test]
    async fn test_nothing_presented() {
        let request = Request::builder()
            .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap();
        assert!(extract(request).await.0.is_none());
    }

    #[test]
    fn test_form_token_preferred() {
        let presented = PresentedToken(Some("header".to_string()));
        assert_eq!(
            presented.clone().or_form(Some("form".to_string())).as_deref(),
            Some("form")
        );
        assert_eq!(
            presented.or_form(Some(String::new())).as_deref(),
            Some("header")
        );
        assert!(PresentedToken(None).or_form(None).is_none());
    }

    #[test]
    fn test_admin_cookie_attributes() {
        let cookie = admin_cookie("tok");
        assert_eq!(cookie.name(), ADMIN_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.path(), Some("/admin"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
    }
}
