use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tower_maiden::api::{self, AppState};
use tower_maiden::bot::Bot;
use tower_maiden::config::Config;
use tower_maiden::discord::RestMessenger;
use tower_maiden::metrics;
use tower_maiden::store::Store;
use tower_maiden::sweeper;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    metrics::register_metrics();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    let store = match Store::open(&config.data_dir) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(path = %config.data_dir.display(), "Failed to open data store: {e}");
            std::process::exit(1);
        }
    };

    let messenger = Arc::new(RestMessenger::new(&config));
    let bot = Arc::new(
        Bot::new(store, messenger, config.guild_id.clone())
            .with_idle_timeout(config.panel_idle_timeout),
    );
    sweeper::spawn_sweeper(bot.clone());

    let app = api::router(AppState {
        bot,
        public_key: config.public_key,
        media_base: config.media_base_url.clone(),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {addr}: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("Tower Maiden listening on port {}", config.port);
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
