pub mod api;
pub mod captcha;
pub mod config;
pub mod imaging;
pub mod pipeline;
pub mod session_store;
pub mod storage;

use tracing_subscriber::EnvFilter;

use crate::api::AppContext;
use crate::config::AppConfig;

/// Load configuration, start the server and run until Ctrl-C.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter(config.environment))),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    if config.uses_default_secret() && !config.environment.is_debug() {
        tracing::warn!("SECRET_KEY not set, using the development default");
    }

    config.ensure_dirs()?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        environment = ?config.environment,
        "Data directories ready"
    );

    let bind_addr = config.bind_addr;
    let server = api::start_server_on(AppContext::new(config), bind_addr).await?;
    tracing::info!(addr = %server.addr(), "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    server.shutdown_and_wait().await;

    Ok(())
}
