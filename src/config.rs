use anyhow::{bail, Context, Result};
use std::collections::HashMap;

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    pub base_url: String,

    // ── Database ────────────────────────────────────────────────────────
    pub database_url: String,
    /// Name of the token table. Must be a plain SQL identifier.
    pub table_tokens: String,

    // ── AWeber ──────────────────────────────────────────────────────────
    pub aweber_client_id: String,
    pub aweber_client_secret: String,
    pub aweber_redirect_uri: String,
    pub aweber_auth_url: String,
    pub aweber_api_url: String,

    /// Accounts allowed to authorize, keyed by the OAuth `state` value,
    /// mapping to the AWeber account id tokens are stored against.
    pub allowed_accounts: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = var("BASE_URL")
            .unwrap_or_else(|| "http://localhost:8420".into())
            .trim_end_matches('/')
            .to_string();

        let table_tokens = var("TABLE_TOKENS").unwrap_or_else(|| "contactly_tokens".into());
        if !is_identifier(&table_tokens) {
            bail!("TABLE_TOKENS must be a plain SQL identifier, got {table_tokens:?}");
        }

        Ok(Config {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: var("PORT")
                .unwrap_or_else(|| "8420".into())
                .parse()
                .context("Invalid PORT")?,
            aweber_redirect_uri: var("AWEBER_REDIRECT_URI")
                .unwrap_or_else(|| format!("{base_url}/forward-contact/auth")),
            base_url,

            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://contactly.db?mode=rwc".into()),
            table_tokens,

            aweber_client_id: var("AWEBER_CLIENT_ID").context("AWEBER_CLIENT_ID is required")?,
            aweber_client_secret: var("AWEBER_CLIENT_SECRET")
                .context("AWEBER_CLIENT_SECRET is required")?,
            aweber_auth_url: var("AWEBER_AUTH_URL")
                .unwrap_or_else(|| "https://auth.aweber.com/oauth2".into())
                .trim_end_matches('/')
                .to_string(),
            aweber_api_url: var("AWEBER_API_URL")
                .unwrap_or_else(|| "https://api.aweber.com/1.0".into())
                .trim_end_matches('/')
                .to_string(),

            allowed_accounts: parse_accounts(&var("ALLOWED_ACCOUNTS").unwrap_or_default())?,
        })
    }

    /// AWeber account id for an allowed OAuth `state`, if any.
    pub fn destination_account(&self, state: &str) -> Option<&str> {
        self.allowed_accounts.get(state).map(String::as_str)
    }
}

/// Parse `state=accountId` pairs separated by commas.
fn parse_accounts(raw: &str) -> Result<HashMap<String, String>> {
    let mut accounts = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (state, account) = pair
            .split_once('=')
            .with_context(|| format!("ALLOWED_ACCOUNTS entry {pair:?} is not state=accountId"))?;
        let (state, account) = (state.trim(), account.trim());
        if state.is_empty() || account.is_empty() {
            bail!("ALLOWED_ACCOUNTS entry {pair:?} has an empty side");
        }
        accounts.insert(state.to_string(), account.to_string());
    }
    Ok(accounts)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
