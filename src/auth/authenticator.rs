//! Authenticator implementation
//!
//! Applies the bearer credential to outgoing requests.

use super::types::Credential;
use crate::error::{Error, Result};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;

/// Authenticator handles applying authentication to HTTP requests
#[derive(Debug, Clone)]
pub struct Authenticator {
    credential: Credential,
}

impl Authenticator {
    /// Create a new authenticator for the given credential
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    /// Apply authentication to a request builder
    pub fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        Ok(req.header(AUTHORIZATION, self.header_value()?))
    }

    /// Build the `Authorization` header value
    pub fn header_value(&self) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.credential.secret()))
            .map_err(|_| Error::auth("bearer token contains characters not allowed in a header"))?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// The credential in use
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}
