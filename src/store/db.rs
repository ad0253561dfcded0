//! SQLite-backed, append-only token store.
//!
//! Every token (initial exchange or refresh) is a new row keyed by
//! (`key`, `created_at`). Reads pick the newest row for a key.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::AppError;
use crate::providers::TokenSet;

/// Token store backed by a single SQLite table.
#[derive(Clone)]
pub struct TokenStore {
    pool: SqlitePool,
    table: String,
}

impl TokenStore {
    pub async fn new(db_url: &str, table: &str) -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to {db_url}: {e}")))?;

        Ok(Self::from_pool(pool, table))
    }

    /// Wrap an existing pool. `table` must already be a validated identifier.
    pub fn from_pool(pool: SqlitePool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
        }
    }

    /// Create the token table if it does not exist.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id              TEXT NOT NULL,
                key             TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                destination     TEXT,
                destination_id  TEXT,
                access_token    TEXT,
                refresh_token   TEXT,
                expires         TEXT,
                PRIMARY KEY (key, created_at)
            )
            "#,
            table = self.table
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append a token record for `id`. Never updates an existing row.
    pub async fn store_token(
        &self,
        id: &str,
        token: &TokenSet,
        destination: &str,
        destination_id: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let expires = token.expires_at(now);

        sqlx::query(&format!(
            r#"
            INSERT INTO {table}
                (id, key, created_at, destination, destination_id,
                 access_token, refresh_token, expires)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            table = self.table
        ))
        .bind(id)
        .bind(record_key(id))
        .bind(timestamp(now))
        .bind(destination)
        .bind(destination_id)
        .bind(&token.access_token)
        .bind(token.refresh_token.as_deref().unwrap_or_default())
        .bind(timestamp(expires))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Freshest token record for `id`, or `None` if it never authorized.
    pub async fn get_token(&self, id: &str) -> Result<Option<TokenRecord>, AppError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT id, key, created_at, destination, destination_id,
                   access_token, refresh_token, expires
            FROM {table}
            WHERE key = ?1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            table = self.table
        ))
        .bind(record_key(id))
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let created_at: String = row.get(2);
        let expires: Option<String> = row.try_get(7).ok().flatten();

        Ok(Some(TokenRecord {
            id: row.get(0),
            key: row.get(1),
            created_at: parse_timestamp(&created_at),
            destination: non_empty(row.try_get(3).ok().flatten()),
            destination_id: non_empty(row.try_get(4).ok().flatten()),
            access_token: non_empty(row.try_get(5).ok().flatten()),
            refresh_token: non_empty(row.try_get(6).ok().flatten()),
            expires: expires.as_deref().and_then(parse_timestamp),
        }))
    }
}

/// Storage key for an account id.
pub fn record_key(id: &str) -> String {
    format!("user-{id}")
}

// Fixed-width UTC so lexical order matches chronological order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ── Types ────────────────────────────────────────────────────────────────────

/// One immutable row of token history.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub id: String,
    pub key: String,
    pub created_at: Option<DateTime<Utc>>,
    pub destination: Option<String>,
    pub destination_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires: Option<DateTime<Utc>>,
}
