//! Application configuration.
//!
//! Built once at startup by `AppConfig::from_env()` and handed to
//! `api::AppContext`. Nothing reads the environment after that point.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Application-level constants
pub const APP_NAME: &str = "Contrast Studio";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lower bound applied to the user contrast level.
pub const MIN_CONTRAST: f32 = 0.1;
/// Upper bound applied to the user contrast level.
pub const MAX_CONTRAST: f32 = 3.0;
/// Contrast used when the form value is missing or unparsable.
pub const DEFAULT_CONTRAST: f32 = 1.0;

/// Maximum request body size (16 MB).
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

const DEFAULT_SECRET_KEY: &str = "dev-key-change-in-production";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_DATA_DIR: &str = "static";

/// Runtime environment. Only affects log verbosity and startup warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse an environment name. `default` is accepted as development.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "default" | "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::InvalidValue {
                key: "APP_ENV",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_debug(self) -> bool {
        matches!(self, Self::Development)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// CAPTCHA rendering parameters.
#[derive(Debug, Clone)]
pub struct CaptchaConfig {
    pub length: usize,
    pub width: u32,
    pub height: u32,
    /// Seconds before an issued challenge stops being accepted.
    pub ttl_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            length: 6,
            width: 280,
            height: 90,
            ttl_secs: 600, // 10 minutes
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub secret_key: String,
    pub bind_addr: SocketAddr,
    /// Root for `uploads/`, `results/` and `graphs/`.
    pub data_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub captcha: CaptchaConfig,
    /// Delete stored images older than this. `None` keeps everything.
    pub retention_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            secret_key: DEFAULT_SECRET_KEY.into(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            captcha: CaptchaConfig::default(),
            retention_secs: None,
        }
    }
}

impl AppConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// `APP_ENV` wins over the legacy `FLASK_ENV` name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").or_else(|| lookup("FLASK_ENV")) {
            Some(value) => Environment::parse(&value)?,
            None => Environment::Development,
        };

        let secret_key = lookup("SECRET_KEY")
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string());

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "BIND_ADDR",
                value: bind_raw.clone(),
            })?;

        let data_dir = lookup("DATA_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let retention_secs = match lookup("RETENTION_SECS").filter(|v| !v.trim().is_empty()) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        key: "RETENTION_SECS",
                        value: raw,
                    })
                }
                Ok(secs) => Some(secs),
            },
            None => None,
        };

        Ok(Self {
            environment,
            secret_key,
            bind_addr,
            data_dir,
            retention_secs,
            ..Self::default()
        })
    }

    /// True when no `SECRET_KEY` was supplied.
    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    /// Directory holding original uploads.
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Directory holding contrast-adjusted results.
    pub fn result_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    /// Directory reserved for rendered graphs.
    pub fn graph_dir(&self) -> PathBuf {
        self.data_dir.join("graphs")
    }

    /// Create every data directory if missing.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for dir in [self.upload_dir(), self.result_dir(), self.graph_dir()] {
            create_dir(&dir)?;
        }
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(|source| ConfigError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter(environment: Environment) -> &'static str {
    if environment.is_debug() {
        "contrast_studio=debug,tower_http=debug,info"
    } else {
        "contrast_studio=info,tower_http=info,warn"
    }
}
