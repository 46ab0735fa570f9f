//! Shared state for the HTTP layer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use crate::api::error::ApiError;
use crate::captcha::{CaptchaGenerator, Challenge};
use crate::config::AppConfig;
use crate::imaging::{FeatureClassifier, ImageClassifier};
use crate::pipeline::ContrastPipeline;
use crate::session_store::SessionStore;
use crate::storage::ImageStore;

// ═══════════════════════════════════════════════════════════
// App context
// ═══════════════════════════════════════════════════════════

/// Shared context for all routes. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub captcha: Arc<CaptchaGenerator>,
    pub pipeline: ContrastPipeline,
}

impl AppContext {
    /// Build the context with the built-in feature classifier.
    pub fn new(config: AppConfig) -> Self {
        Self::with_classifier(config, Arc::new(FeatureClassifier::default()))
    }

    /// Build the context around a specific classifier.
    pub fn with_classifier(config: AppConfig, classifier: Arc<dyn ImageClassifier>) -> Self {
        let store = ImageStore::new(config.upload_dir(), config.result_dir());
        let sessions = SessionStore::new(Duration::from_secs(config.captcha.ttl_secs));
        let captcha = CaptchaGenerator::new(config.captcha.clone());
        Self {
            pipeline: ContrastPipeline::new(store, classifier),
            sessions: Arc::new(Mutex::new(sessions)),
            captcha: Arc::new(captcha),
            config: Arc::new(config),
        }
    }

    pub fn secret_key(&self) -> &str {
        &self.config.secret_key
    }

    /// Generate a challenge and store its answer for `session`,
    /// replacing whatever was there.
    pub fn issue_challenge(&self, session: Uuid) -> Result<Challenge, ApiError> {
        let challenge = self.captcha.generate();
        self.sessions
            .lock()
            .map_err(|_| ApiError::Internal("session store lock poisoned".into()))?
            .issue(session, challenge.text.clone());
        Ok(challenge)
    }

    /// Remove and return the live challenge for `session`, if any.
    pub fn take_challenge(&self, session: Option<Uuid>) -> Result<Option<String>, ApiError> {
        let Some(session) = session else {
            return Ok(None);
        };
        let challenge = self
            .sessions
            .lock()
            .map_err(|_| ApiError::Internal("session store lock poisoned".into()))?
            .take(&session);
        Ok(challenge)
    }
}
