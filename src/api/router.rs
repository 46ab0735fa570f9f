//! HTTP router.
//!
//! Routes:
//! - `GET  /`                    upload page (issues CAPTCHA + session cookie)
//! - `POST /process`             multipart upload → JSON result
//! - `GET  /download/:filename`  stored result as attachment
//! - `GET  /captcha`             fresh CAPTCHA for the session
//! - `GET  /health`              liveness

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::AppContext;

/// Build the application router around a shared context.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn build_router(ctx: AppContext) -> Router {
    let body_limit = ctx.config.max_upload_bytes;

    Router::new()
        .route("/", get(endpoints::index::page))
        .route("/process", post(endpoints::process::submit))
        .route("/download/:filename", get(endpoints::download::result_file))
        .route("/captcha", get(endpoints::captcha::refresh))
        .route("/health", get(endpoints::health::check))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use image::{DynamicImage, RgbImage};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::AppConfig;
    use crate::imaging::encode::{encode_png, from_base64};
    use crate::session_store::sign_session;

    const BOUNDARY: &str = "----contrast-test-boundary";
    const ANSWER: &str = "ABC234";

    struct Harness {
        ctx: AppContext,
        _tmp: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_limit(crate::config::MAX_UPLOAD_BYTES)
        }

        fn with_limit(max_upload_bytes: usize) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let config = AppConfig {
                data_dir: tmp.path().to_path_buf(),
                max_upload_bytes,
                ..AppConfig::default()
            };
            config.ensure_dirs().unwrap();
            Self {
                ctx: AppContext::new(config),
                _tmp: tmp,
            }
        }

        fn app(&self) -> Router {
            build_router(self.ctx.clone())
        }

        /// A session with a known challenge; returns its cookie header.
        fn session_with_challenge(&self, answer: &str) -> String {
            let id = Uuid::new_v4();
            self.ctx.sessions.lock().unwrap().issue(id, answer.to_string());
            format!("session={}", sign_session(&id, self.ctx.secret_key()))
        }
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
                Part::File(name, filename, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn process_request(cookie: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/process")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn small_png() -> Vec<u8> {
        let img = RgbImage::from_fn(10, 10, |x, y| image::Rgb([(x * 25) as u8, (y * 25) as u8, 128]));
        encode_png(&DynamicImage::ImageRgb8(img)).unwrap()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    // -- Index ---------------------------------------------------------------

    #[tokio::test]
    async fn index_returns_page_and_session_cookie() {
        let h = Harness::new();
        let resp = h.app().oneshot(get_request("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("session="));
        assert_eq!(h.ctx.sessions.lock().unwrap().len(), 1);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("Image Contrast Adjustment"));
        assert!(html.contains("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn index_reuses_existing_session() {
        let h = Harness::new();
        let cookie = h.session_with_challenge("OLDONE");
        let req = Request::builder()
            .uri("/")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let resp = h.app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(h.ctx.sessions.lock().unwrap().len(), 1);
    }

    // -- Process -------------------------------------------------------------

    #[tokio::test]
    async fn empty_form_is_rejected() {
        let h = Harness::new();
        let resp = h
            .app()
            .oneshot(process_request(None, multipart_body(&[])))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn non_multipart_body_is_an_empty_form() {
        let h = Harness::new();
        let req = Request::builder()
            .method("POST")
            .uri("/process")
            .body(Body::empty())
            .unwrap();
        let resp = h.app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "Invalid CAPTCHA answer");
    }

    #[tokio::test]
    async fn wrong_captcha_is_rejected() {
        let h = Harness::new();
        let cookie = h.session_with_challenge(ANSWER);
        let png = small_png();
        let body = multipart_body(&[
            Part::Text("captcha", "WRONG1"),
            Part::File("image", "test.png", &png),
        ]);
        let resp = h.app().oneshot(process_request(Some(&cookie), body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Invalid CAPTCHA answer");
    }

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let h = Harness::new();
        let cookie = h.session_with_challenge(ANSWER);
        let body = multipart_body(&[Part::Text("captcha", ANSWER)]);
        let resp = h.app().oneshot(process_request(Some(&cookie), body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "No image file selected");
    }

    #[tokio::test]
    async fn empty_filename_is_missing_file() {
        let h = Harness::new();
        let cookie = h.session_with_challenge(ANSWER);
        let body = multipart_body(&[
            Part::Text("captcha", ANSWER),
            Part::File("image", "", b""),
        ]);
        let resp = h.app().oneshot(process_request(Some(&cookie), body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "No image file selected");
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let h = Harness::new();
        let cookie = h.session_with_challenge(ANSWER);
        let body = multipart_body(&[
            Part::Text("captcha", ANSWER),
            Part::File("image", "notes.txt", b"hello"),
        ]);
        let resp = h.app().oneshot(process_request(Some(&cookie), body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Unsupported file format");
    }

    #[tokio::test]
    async fn undecodable_image_is_internal_error() {
        let h = Harness::new();
        let cookie = h.session_with_challenge(ANSWER);
        let body = multipart_body(&[
            Part::Text("captcha", ANSWER),
            Part::File("image", "broken.png", b"not really a png"),
        ]);
        let resp = h.app().oneshot(process_request(Some(&cookie), body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().starts_with("Failed to decode image"));
    }

    #[tokio::test]
    async fn full_upload_then_download() {
        let h = Harness::new();
        let cookie = h.session_with_challenge(ANSWER);
        let png = small_png();
        let body = multipart_body(&[
            Part::Text("captcha", " abc234 "),
            Part::Text("contrast", "2.0"),
            Part::File("image", "test.png", &png),
        ]);
        let resp = h.app().oneshot(process_request(Some(&cookie), body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["contrast_level"], 2.0);
        for key in [
            "original_image",
            "result_image",
            "original_histogram",
            "enhanced_histogram",
            "category",
        ] {
            assert!(
                json[key].as_str().is_some_and(|s| !s.is_empty()),
                "{key} should be non-empty"
            );
        }

        let result_filename = json["result_filename"].as_str().unwrap().to_string();
        let id = result_filename
            .strip_prefix("result_")
            .and_then(|s| s.strip_suffix(".png"))
            .unwrap();
        assert!(Uuid::parse_str(id).is_ok());

        // Inline payload equals the stored file
        let stored = std::fs::read(h.ctx.pipeline.store().result_dir().join(&result_filename)).unwrap();
        let inline = from_base64(json["result_image"].as_str().unwrap()).unwrap();
        assert_eq!(inline, stored);

        let resp = h
            .app()
            .oneshot(get_request(&format!("/download/{result_filename}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            format!("attachment; filename=\"contrast_adjusted_{result_filename}\"").as_str()
        );
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), stored.as_slice());
    }

    #[tokio::test]
    async fn challenge_cannot_be_replayed() {
        let h = Harness::new();
        let cookie = h.session_with_challenge(ANSWER);
        let png = small_png();
        let body = || {
            multipart_body(&[
                Part::Text("captcha", ANSWER),
                Part::File("image", "test.png", &png),
            ])
        };

        let first = h.app().oneshot(process_request(Some(&cookie), body())).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = h.app().oneshot(process_request(Some(&cookie), body())).await.unwrap();
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(second).await["error"], "Invalid CAPTCHA answer");
    }

    #[tokio::test]
    async fn failed_attempt_consumes_challenge() {
        let h = Harness::new();
        let cookie = h.session_with_challenge(ANSWER);
        let body = multipart_body(&[Part::Text("captcha", "WRONG1")]);
        h.app().oneshot(process_request(Some(&cookie), body)).await.unwrap();
        assert!(h.ctx.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let h = Harness::with_limit(1024);
        let cookie = h.session_with_challenge(ANSWER);
        let big = vec![0u8; 8 * 1024];
        let body = multipart_body(&[
            Part::Text("captcha", ANSWER),
            Part::File("image", "big.png", &big),
        ]);
        let resp = h.app().oneshot(process_request(Some(&cookie), body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body_json(resp).await["error"].is_string());
    }

    // -- Download ------------------------------------------------------------

    #[tokio::test]
    async fn download_missing_file_is_404() {
        let h = Harness::new();
        let resp = h
            .app()
            .oneshot(get_request("/download/nonexistent.jpg"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(body_json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn download_rejects_traversal() {
        let h = Harness::new();
        std::fs::write(h.ctx.config.data_dir.join("secret.txt"), b"x").unwrap();
        let resp = h
            .app()
            .oneshot(get_request("/download/..%2Fsecret.txt"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    // -- CAPTCHA / health ----------------------------------------------------

    #[tokio::test]
    async fn captcha_refresh_replaces_challenge() {
        let h = Harness::new();
        let cookie = h.session_with_challenge(ANSWER);
        let req = Request::builder()
            .uri("/captcha")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let resp = h.app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(json["captcha_image"].as_str().is_some_and(|s| !s.is_empty()));

        // Old answer no longer verifies
        let body = multipart_body(&[Part::Text("captcha", ANSWER)]);
        let resp = h.app().oneshot(process_request(Some(&cookie), body)).await.unwrap();
        assert_eq!(body_json(resp).await["error"], "Invalid CAPTCHA answer");
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let h = Harness::new();
        let resp = h.app().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let h = Harness::new();
        let resp = h.app().oneshot(get_request("/nope")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
