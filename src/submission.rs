//! Wix Forms submission payload.
//!
//! Only `contact.email` and `contact.name` are interpreted. `data` is kept as
//! the raw JSON so the forward response can echo it back unchanged, whatever
//! types the form builder used for the other fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormSubmission {
    #[serde(default)]
    pub data: Value,
}

impl FormSubmission {
    /// Parse a request body. An empty body is an empty submission.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
    }

    /// Trimmed email, if one was submitted as a string.
    pub fn email(&self) -> Option<&str> {
        self.data
            .pointer("/contact/email")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// "First Last", or whichever half is present.
    pub fn full_name(&self) -> Option<String> {
        let name = self.data.pointer("/contact/name")?;
        let parts: Vec<&str> = ["first", "last"]
            .into_iter()
            .filter_map(|part| name.get(part).and_then(Value::as_str))
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}
