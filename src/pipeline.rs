//! Upload processing pipeline.
//!
//! Runs the fixed sequence for one submission and returns an explicit
//! result; HTTP concerns stay in `api`. Checks happen in order and the
//! first failure wins:
//!
//! 1. CAPTCHA answer matches the session challenge
//! 2. An image file with a non-empty name is present
//! 3. The extension is allowed
//!
//! Nothing touches disk before all three pass. After that: save original →
//! decode + normalise mode → adjust contrast → save result PNG → histograms
//! → classify → inline base64.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::captcha;
use crate::imaging::contrast::{adjust_contrast, normalize_color_mode, parse_contrast_level};
use crate::imaging::encode::{decode_image, encode_png, to_base64};
use crate::imaging::histogram::histogram_base64;
use crate::imaging::upload::allowed_file;
use crate::imaging::{ClassifierError, ImageClassifier, ImagingError};
use crate::storage::{ImageStore, StorageError};

// ═══════════════════════════════════════════════════════════
// Input / output types
// ═══════════════════════════════════════════════════════════

/// A file part from the upload form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Parsed upload form. Every field is optional at this stage.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub captcha: String,
    pub image: Option<UploadedFile>,
    pub contrast: Option<String>,
}

/// Successful processing result, serialized as the response body.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub success: bool,
    pub original_image: String,
    pub result_image: String,
    pub original_histogram: String,
    pub enhanced_histogram: String,
    pub contrast_level: f32,
    pub category: String,
    pub result_filename: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Invalid CAPTCHA answer")]
    InvalidCaptcha,
    #[error("No image file selected")]
    MissingFile,
    #[error("Unsupported file format")]
    UnsupportedFormat,
    #[error("{0}")]
    Internal(String),
}

impl From<StorageError> for ProcessError {
    fn from(err: StorageError) -> Self {
        ProcessError::Internal(err.to_string())
    }
}

impl From<ImagingError> for ProcessError {
    fn from(err: ImagingError) -> Self {
        ProcessError::Internal(err.to_string())
    }
}

impl From<ClassifierError> for ProcessError {
    fn from(err: ClassifierError) -> Self {
        ProcessError::Internal(err.to_string())
    }
}

// ═══════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════

/// The request-processing core, with its collaborators injected.
#[derive(Clone)]
pub struct ContrastPipeline {
    store: ImageStore,
    classifier: Arc<dyn ImageClassifier>,
}

impl ContrastPipeline {
    pub fn new(store: ImageStore, classifier: Arc<dyn ImageClassifier>) -> Self {
        Self { store, classifier }
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Validate and process one submission.
    ///
    /// `expected_captcha` is the challenge stored for the caller's session,
    /// already consumed by the caller.
    pub fn process(
        &self,
        expected_captcha: Option<&str>,
        form: UploadForm,
    ) -> Result<ProcessOutcome, ProcessError> {
        let file = validate(expected_captcha, &form)?;
        let contrast_level = parse_contrast_level(form.contrast.as_deref());
        let started = Instant::now();

        // 1. Persist the original exactly as received
        let original = self.store.save_original(&file.filename, &file.bytes)?;

        // 2. Decode and normalise colour mode
        let image = normalize_color_mode(decode_image(&file.bytes)?);

        // 3. Contrast
        let enhanced = adjust_contrast(&image, contrast_level);

        // 4. Persist the result as PNG
        let result_png = encode_png(&enhanced)?;
        let result = self.store.save_result(&result_png)?;

        // 5. Histograms
        let original_histogram = histogram_base64(&image)?;
        let enhanced_histogram = histogram_base64(&enhanced)?;

        // 6. Classification
        let category = self.classifier.classify(&enhanced)?;

        // 7. Inline payloads; the result payload is the stored file's bytes
        let original_image = to_base64(&encode_png(&image)?);
        let result_image = to_base64(&result_png);

        tracing::info!(
            original = %original.name,
            result = %result.name,
            width = image.width(),
            height = image.height(),
            contrast = contrast_level,
            category = %category,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upload processed"
        );

        Ok(ProcessOutcome {
            success: true,
            original_image,
            result_image,
            original_histogram,
            enhanced_histogram,
            contrast_level,
            category,
            result_filename: result.name,
        })
    }
}

/// Precondition checks, in the order that decides which error wins.
fn validate<'a>(
    expected_captcha: Option<&str>,
    form: &'a UploadForm,
) -> Result<&'a UploadedFile, ProcessError> {
    if !captcha::verify(&form.captcha, expected_captcha) {
        return Err(ProcessError::InvalidCaptcha);
    }

    let file = match &form.image {
        Some(file) if !file.filename.is_empty() => file,
        _ => return Err(ProcessError::MissingFile),
    };

    if !allowed_file(&file.filename) {
        return Err(ProcessError::UnsupportedFormat);
    }

    Ok(file)
}
