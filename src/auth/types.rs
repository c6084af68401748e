//! Credential type
//!
//! The bearer token is an opaque secret. It is never printed: `Debug`
//! redacts it and there is no `Display` implementation.

/// Environment variable holding the bearer token
pub const BEARER_TOKEN_ENV: &str = "BEARER_TOKEN";

/// Opaque bearer token presented in the `Authorization` header
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Create a credential from a raw token
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read the credential from `BEARER_TOKEN`.
    ///
    /// A missing or empty variable yields an empty credential; the server
    /// rejects it on the first request.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the credential through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl FnOnce(&str) -> Option<String>) -> Self {
        Self {
            token: lookup(BEARER_TOKEN_ENV).unwrap_or_default(),
        }
    }

    /// Whether no token was supplied
    pub fn is_empty(&self) -> bool {
        self.token.trim().is_empty()
    }

    /// The raw token
    pub fn secret(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.is_empty() { "<empty>" } else { "<redacted>" };
        f.debug_tuple("Credential").field(&shown).finish()
    }
}
