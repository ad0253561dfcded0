mod aweber;
mod traits;

pub use aweber::{AweberProvider, DESTINATION};
pub use traits::{OAuthProvider, TokenSet, DEFAULT_EXPIRES_IN};
