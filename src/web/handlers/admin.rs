//! Admin pages: passcode login, rename and delete.

use std::sync::Arc;

use askama::Template;
use askama_axum::IntoResponse;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Redirect, Response},
    Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::{run_blocking, AppState, FileRow};
use crate::admin::AdminToken;
use crate::storage::BucketKey;
use crate::web::error::ApiError;
use crate::web::middleware::{admin_cookie, PresentedToken};

#[derive(Template)]
#[template(path = "admin_login.html")]
pub struct AdminLoginTemplate {
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminTemplate {
    pub files: Vec<FileRow>,
    pub token: String,
    pub expires_in_mins: u64,
}

/// Passcode form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub passcode: String,
}

/// Delete form.
#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    pub bucket: String,
    pub name: String,
    pub token: Option<String>,
}

/// Rename form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameForm {
    pub bucket: String,
    pub old_name: String,
    pub new_name: String,
    pub token: Option<String>,
}

/// GET /admin - Listing for a client holding a valid admin cookie, login form otherwise.
pub async fn admin_page(
    State(state): State<Arc<AppState>>,
    presented: PresentedToken,
) -> Result<Response, ApiError> {
    let token = presented.0.and_then(|t| state.gate.verify(&t).ok());

    match token {
        Some(token) => render_admin(&state, &token).await,
        None => Ok(AdminLoginTemplate { error: None }.into_response()),
    }
}

/// POST /admin - Check the passcode and show the admin listing.
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let token = match state.gate.authorize(&form.passcode) {
        Ok(token) => token,
        Err(_) => {
            return Ok((
                StatusCode::UNAUTHORIZED,
                AdminLoginTemplate {
                    error: Some("Invalid passcode".to_string()),
                },
            )
                .into_response());
        }
    };

    let page = render_admin(&state, &token).await?;
    Ok((jar.add(admin_cookie(token.as_str())), page).into_response())
}

/// POST /admin/delete - Delete a stored file.
pub async fn admin_delete(
    State(state): State<Arc<AppState>>,
    presented: PresentedToken,
    Form(form): Form<DeleteForm>,
) -> Result<Redirect, ApiError> {
    let token = require_token(&state, presented, form.token)?;
    let bucket: BucketKey = form.bucket.parse()?;

    let mutator = state.mutator.clone();
    let name = form.name;
    run_blocking(move || mutator.delete(&token, bucket, &name)).await?;

    Ok(Redirect::to("/admin"))
}

/// POST /admin/rename - Rename a stored file within its bucket.
pub async fn admin_rename(
    State(state): State<Arc<AppState>>,
    presented: PresentedToken,
    Form(form): Form<RenameForm>,
) -> Result<Redirect, ApiError> {
    let token = require_token(&state, presented, form.token)?;
    let bucket: BucketKey = form.bucket.parse()?;

    let mutator = state.mutator.clone();
    let (old_name, new_name) = (form.old_name, form.new_name);
    run_blocking(move || mutator.rename(&token, bucket, &old_name, &new_name)).await?;

    Ok(Redirect::to("/admin"))
}

fn require_token(
    state: &AppState,
    presented: PresentedToken,
    form_token: Option<String>,
) -> Result<AdminToken, ApiError> {
    let raw = presented
        .or_form(form_token)
        .ok_or_else(|| ApiError::unauthorized("Admin token required"))?;
    Ok(state.gate.verify(&raw)?)
}

async fn render_admin(state: &AppState, token: &AdminToken) -> Result<Response, ApiError> {
    let files = state.file_rows().await?;

    Ok(AdminTemplate {
        files,
        token: token.as_str().to_string(),
        expires_in_mins: state.gate.expiry_secs() / 60,
    }
    .into_response())
}
