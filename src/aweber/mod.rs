//! AWeber destination: REST client and the types it exchanges.

pub mod client;
pub mod types;

pub use client::AweberClient;
pub use types::{Credentials, MailingList, NewSubscriber, SubscriberResult, TokenSink};
