use async_trait::async_trait;

use super::db::TokenStore;
use crate::aweber::TokenSink;
use crate::error::AppError;
use crate::providers::TokenSet;

/// Appends every refreshed token to the store under one account.
pub struct StoreTokenSink {
    store: TokenStore,
    id: String,
    destination: String,
    destination_id: String,
}

impl StoreTokenSink {
    pub fn new(store: TokenStore, id: String, destination: String, destination_id: String) -> Self {
        Self {
            store,
            id,
            destination,
            destination_id,
        }
    }
}

#[async_trait]
impl TokenSink for StoreTokenSink {
    async fn token_refreshed(&self, token: &TokenSet) -> Result<(), AppError> {
        tracing::info!(account = %self.id, destination_id = %self.destination_id, "Storing refreshed token");
        self.store
            .store_token(&self.id, token, &self.destination, &self.destination_id)
            .await
    }
}
