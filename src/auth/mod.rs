//! Authentication module
//!
//! The sampled stream only accepts app-only bearer tokens. The `Credential`
//! is read once at startup and handed to the `Authenticator`, which stamps it
//! onto every stream request.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{Credential, BEARER_TOKEN_ENV};

#[cfg(test)]
mod tests;
