//! Image-side collaborators of the processing pipeline.
//!
//! Each submodule is independent: `upload` checks names, `contrast`
//! transforms pixels, `histogram` draws charts, `classifier` labels images
//! and `encode` moves between pixels, PNG bytes and base64.

pub mod classifier;
pub mod contrast;
pub mod encode;
pub mod histogram;
pub mod upload;

pub use classifier::{ClassifierError, FeatureClassifier, ImageClassifier};

#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    #[error("{0}")]
    Decode(String),
    #[error("{0}")]
    Encode(String),
}
