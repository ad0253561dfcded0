pub mod api;
pub mod aweber;
pub mod config;
pub mod error;
pub mod providers;
pub mod store;
pub mod submission;

pub use config::Config;
pub use error::AppError;

use std::sync::Arc;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub store: store::TokenStore,
    pub provider: Arc<dyn providers::OAuthProvider>,
    /// Shared outbound HTTP client (connection pool).
    pub http: reqwest::Client,
}

pub type SharedState = Arc<AppState>;
