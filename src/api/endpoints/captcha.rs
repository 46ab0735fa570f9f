//! `GET /captcha`: replace the session's challenge.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::api::endpoints::{resolve_session, with_session_cookie};
use crate::api::error::ApiError;
use crate::api::types::AppContext;

#[derive(Serialize)]
pub struct CaptchaResponse {
    pub captcha_image: String,
}

/// New challenge for the caller's session, image as base64 PNG.
pub async fn refresh(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = resolve_session(&ctx, &headers);
    let challenge = ctx.issue_challenge(session.id)?;
    let captcha_image = challenge.image_base64()?;

    let response = Json(CaptchaResponse { captcha_image }).into_response();
    Ok(with_session_cookie(response, &ctx, session))
}
