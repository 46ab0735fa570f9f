//! `GET /download/:filename`: serve a stored result as an attachment.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::AppContext;

/// Stream a result file back with `contrast_adjusted_` prefixed to its name.
///
/// Any caller who knows a result name may download it.
pub async fn result_file(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = ctx.pipeline.store().result_path(&filename)?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(filename));
        }
        Err(e) => return Err(ApiError::Internal(format!("Failed to read {filename}: {e}"))),
    };

    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    tracing::info!(filename = %filename, size = bytes.len(), "Result downloaded");

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.essence_str())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"contrast_adjusted_{filename}\""),
        )
        .header(header::CONTENT_LENGTH, bytes.len().to_string())
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(bytes))
        .unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
        }))
}
