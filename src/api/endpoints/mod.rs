//! HTTP endpoint handlers.
//!
//! Handlers stay thin: extract, delegate to the pipeline or stores, map
//! errors through `ApiError`.

pub mod captcha;
pub mod download;
pub mod health;
pub mod index;
pub mod process;

use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use uuid::Uuid;

use crate::api::types::AppContext;
use crate::session_store::{session_cookie_header, session_from_headers};

/// The caller's session id, and whether it was minted for this request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestSession {
    pub id: Uuid,
    pub fresh: bool,
}

/// Verified session from the cookie, or a new one.
pub(crate) fn resolve_session(ctx: &AppContext, headers: &HeaderMap) -> RequestSession {
    match session_from_headers(headers, ctx.secret_key()) {
        Some(id) => RequestSession { id, fresh: false },
        None => RequestSession {
            id: Uuid::new_v4(),
            fresh: true,
        },
    }
}

/// Attach `Set-Cookie` when the session was minted for this request.
pub(crate) fn with_session_cookie(
    mut response: Response,
    ctx: &AppContext,
    session: RequestSession,
) -> Response {
    if !session.fresh {
        return response;
    }
    match HeaderValue::from_str(&session_cookie_header(&session.id, ctx.secret_key())) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => tracing::warn!("Failed to build session cookie: {e}"),
    }
    response
}
