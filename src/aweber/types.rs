use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::providers::TokenSet;

/// Receives tokens the client obtained by refreshing.
///
/// Called after the client's own credentials are updated and before the
/// request that triggered the refresh proceeds. An error aborts that request.
#[async_trait]
pub trait TokenSink: Send + Sync {
    async fn token_refreshed(&self, token: &TokenSet) -> Result<(), AppError>;
}

/// Credentials the client starts from, usually the freshest stored record.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A mailing list entry from `GET /accounts/{id}/lists`, kept exactly as
/// AWeber returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MailingList(pub Value);

#[derive(Debug, Deserialize)]
pub(crate) struct ListPage {
    #[serde(default)]
    pub entries: Vec<MailingList>,
    #[serde(default)]
    pub next_collection_link: Option<String>,
}

/// Body of `POST /accounts/{id}/lists/{list}/subscribers`.
#[derive(Debug, Clone, Serialize)]
pub struct NewSubscriber {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// AWeber expects the string `"true"` to upsert by email.
    pub update_existing: &'static str,
}

impl NewSubscriber {
    pub fn upsert(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
            update_existing: "true",
        }
    }
}

/// Outcome of a subscriber upsert.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberResult {
    pub email: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}
