use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Token lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: u64 = 7200;

// Upper bound on a provider-reported lifetime (one year).
const MAX_EXPIRES_IN: u64 = 365 * 24 * 3600;

/// A set of tokens returned from an OAuth provider after code exchange or refresh.
///
/// Every field is optional on the wire; a missing access token deserializes
/// to an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Seconds until expiry, falling back to [`DEFAULT_EXPIRES_IN`].
    pub fn lifetime_secs(&self) -> u64 {
        self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN)
    }

    /// Absolute expiry for a token issued at `issued_at`.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + Duration::seconds(self.lifetime_secs().min(MAX_EXPIRES_IN) as i64)
    }
}

/// An OAuth 2.0 authorization server the service can connect accounts to.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Unique provider identifier, stored as the record's destination.
    fn id(&self) -> &str;

    /// Scopes requested on the consent screen.
    fn default_scopes(&self) -> Vec<String>;

    /// Build the authorization URL that the user should be redirected to.
    fn auth_url(&self, scopes: &[String], state: &str, redirect_uri: &str) -> String;

    /// Exchange an authorization code for an access token and refresh token.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, AppError>;

    /// Obtain a new access token using a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_set_tolerates_missing_fields() {
        let token: TokenSet = serde_json::from_str(r#"{"refresh_token":"R1"}"#).unwrap();
        assert_eq!(token.access_token, "");
        assert_eq!(token.refresh_token.as_deref(), Some("R1"));
        assert_eq!(token.lifetime_secs(), DEFAULT_EXPIRES_IN);
    }

    #[test]
    fn test_token_set_lifetime_from_response() {
        let token: TokenSet = serde_json::from_str(
            r#"{"access_token":"A1","refresh_token":"R1","token_type":"bearer","expires_in":3600}"#,
        )
        .unwrap();
        assert_eq!(token.lifetime_secs(), 3600);
        assert_eq!(token.token_type.as_deref(), Some("bearer"));
    }

    #[test]
    fn test_expires_at_is_clamped() {
        let now = Utc::now();
        let token = TokenSet {
            expires_in: Some(u64::MAX),
            ..Default::default()
        };
        assert_eq!(token.expires_at(now), now + Duration::seconds(MAX_EXPIRES_IN as i64));
        assert_eq!(
            TokenSet::default().expires_at(now),
            now + Duration::seconds(7200)
        );
    }
}
