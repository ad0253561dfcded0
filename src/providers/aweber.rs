use async_trait::async_trait;

use super::traits::{OAuthProvider, TokenSet};
use crate::error::AppError;

/// Destination name stored with every AWeber token record.
pub const DESTINATION: &str = "AWEBER";

/// AWeber OAuth 2.0 provider.
///
/// Token lifetime: 2 hours.
/// Refresh: Supported, authenticated with HTTP Basic client credentials.
pub struct AweberProvider {
    client_id: String,
    client_secret: String,
    auth_base: String,
    http: reqwest::Client,
}

impl AweberProvider {
    /// `auth_base` is the OAuth root, e.g. `https://auth.aweber.com/oauth2`.
    pub fn new(
        client_id: String,
        client_secret: String,
        auth_base: String,
        http: reqwest::Client,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            auth_base,
            http,
        }
    }

    fn token_url(&self) -> String {
        format!("{}/token", self.auth_base)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .post(self.token_url())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
    }
}

#[async_trait]
impl OAuthProvider for AweberProvider {
    fn id(&self) -> &str {
        DESTINATION
    }

    fn default_scopes(&self) -> Vec<String> {
        vec![
            "account.read".into(),
            "list.read".into(),
            "subscriber.read".into(),
            "list.write".into(),
            "subscriber.write".into(),
        ]
    }

    fn auth_url(&self, scopes: &[String], state: &str, redirect_uri: &str) -> String {
        let scope_str = scopes.join(" ");
        format!(
            "{base}/authorize?\
             response_type=code\
             &client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &scope={scope}\
             &state={state}",
            base = self.auth_base,
            client_id = urlencoding(&self.client_id),
            redirect_uri = urlencoding(redirect_uri),
            scope = urlencoding(&scope_str),
            state = urlencoding(state),
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, AppError> {
        let resp = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await
            .map_err(|e| AppError::FlowError(format!("Token exchange request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::FlowError(format!(
                "AWeber token exchange failed: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| AppError::FlowError(format!("Failed to parse token response: {e}")))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AppError> {
        let resp = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await
            .map_err(|e| AppError::RefreshFailed(format!("Refresh request failed: {e}")))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::RefreshFailed(format!(
                "AWeber refresh failed: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| AppError::RefreshFailed(format!("Failed to parse refresh response: {e}")))
    }
}

/// Simple percent-encoding for URL parameters.
fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
