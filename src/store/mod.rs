//! Token store — append-only history of OAuth tokens per account.

pub mod db;
pub mod sink;

pub use db::{record_key, TokenRecord, TokenStore};
pub use sink::StoreTokenSink;
