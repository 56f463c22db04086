//! Credential pair presented per request and stored on workspace records.
//!
//! The wire form is `"<public>:<secret>"`. Requests carry the username and
//! the combined token in two cookies; records store the same combined form
//! under either the current or the legacy field name (see `record`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cookie carrying the username of the workspace owner.
pub const COOKIE_USERNAME: &str = "username";

/// Cookie carrying the combined `"<public>:<secret>"` token.
pub const COOKIE_SECRET_TOKEN: &str = "secret-token";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The record carries no credential under either field name.
    #[error("record has no credential")]
    Missing,
    /// Both the current and the legacy field are populated.
    #[error("record carries a credential under both field names")]
    Ambiguous,
    /// The raw string is not of the `"<public>:<secret>"` form.
    #[error("malformed credential (expected \"public:secret\")")]
    Malformed,
}

/// A typed public/secret token pair.
///
/// Comparison against a presented token uses exact string equality on the
/// combined form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub public: String,
    pub secret: String,
}

impl Credential {
    /// Parse the `"<public>:<secret>"` wire form. Both halves must be
    /// non-empty; the secret may itself contain further colons.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let (public, secret) = raw.split_once(':').ok_or(CredentialError::Malformed)?;
        if public.is_empty() || secret.is_empty() {
            return Err(CredentialError::Malformed);
        }
        Ok(Self {
            public: public.to_string(),
            secret: secret.to_string(),
        })
    }

    /// Re-join into the combined wire form.
    pub fn combined(&self) -> String {
        format!("{}:{}", self.public, self.secret)
    }

    /// Exact, case-sensitive comparison against a presented combined token.
    pub fn matches(&self, presented: &str) -> bool {
        self.combined() == presented
    }
}
