//! `POST /process`: validate, adjust contrast, return results inline.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::AppContext;
use crate::pipeline::{ProcessOutcome, UploadForm, UploadedFile};
use crate::session_store::session_from_headers;

/// Handle one upload.
///
/// The session's challenge is consumed before validation, so every
/// attempt (successful or not) needs a fresh CAPTCHA. A body that is not
/// multipart is processed as an empty form.
pub async fn submit(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessOutcome>, ApiError> {
    let form = match multipart {
        Ok(multipart) => read_form(multipart).await?,
        Err(rejection) => {
            tracing::debug!("Non-multipart body treated as empty form: {rejection}");
            UploadForm::default()
        }
    };

    let session = session_from_headers(&headers, ctx.secret_key());
    let expected = ctx.take_challenge(session)?;

    let pipeline = ctx.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || pipeline.process(expected.as_deref(), form))
        .await
        .map_err(|e| ApiError::Internal(format!("Processing task failed: {e}")))??;

    Ok(Json(outcome))
}

/// Collect the `captcha`, `image` and `contrast` fields. Unknown fields
/// are skipped; a repeated field keeps its last value.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "captcha" => form.captcha = field.text().await?,
            "contrast" => form.contrast = Some(field.text().await?),
            "image" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await?;
                form.image = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    Ok(form)
}
