use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sportmonks_news::config::Config;
use sportmonks_news::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sportmonks_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("NEWS_CONFIG").unwrap_or_else(|_| "news.toml".to_string());
    let mut config = Config::load_or_default(&config_path)?;
    config.apply_env()?;
    info!(
        "Upstream {} ({} league filters)",
        config.upstream.base_url,
        config.leagues.len()
    );
    if !config.upstream.token_configured() {
        warn!("SPORTMONKS_API_TOKEN is not set; upstream calls will be rejected");
    }

    let addr = config.bind_addr();

    // Create app state
    let state = Arc::new(AppState::new(config)?);

    // Build router
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server starting on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
