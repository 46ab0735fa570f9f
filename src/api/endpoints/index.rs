//! `GET /`: the upload page with a fresh CAPTCHA.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};

use crate::api::endpoints::{resolve_session, with_session_cookie};
use crate::api::error::ApiError;
use crate::api::page::render_index_page;
use crate::api::types::AppContext;

/// Issue a challenge for the caller's session and render the page.
pub async fn page(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = resolve_session(&ctx, &headers);
    let challenge = ctx.issue_challenge(session.id)?;
    let image = challenge.image_base64()?;

    tracing::debug!(session = %session.id, fresh = session.fresh, "CAPTCHA issued for page");

    let response = Html(render_index_page(&image)).into_response();
    Ok(with_session_cookie(response, &ctx, session))
}
