use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use contactly::providers::{AweberProvider, OAuthProvider};
use contactly::store::TokenStore;
use contactly::{api, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contactly=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("contactly v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    if config.allowed_accounts.is_empty() {
        warn!("ALLOWED_ACCOUNTS is empty; no account can authorize");
    }

    let store = TokenStore::new(&config.database_url, &config.table_tokens)
        .await
        .context("Failed to open token database")?;
    store.migrate().await.context("Failed to create token table")?;
    info!(table = %config.table_tokens, "Token store ready");

    let http = reqwest::Client::new();
    let provider: Arc<dyn OAuthProvider> = Arc::new(AweberProvider::new(
        config.aweber_client_id.clone(),
        config.aweber_client_secret.clone(),
        config.aweber_auth_url.clone(),
        http.clone(),
    ));

    let state: SharedState = Arc::new(AppState {
        config: config.clone(),
        store,
        provider,
        http,
    });

    let app = api::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server ready");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
}
