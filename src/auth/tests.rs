//! Tests for the auth module

use super::*;
use crate::error::Error;

#[test]
fn test_bearer_header() {
    let auth = Authenticator::new(Credential::bearer("my-token"));

    let client = reqwest::Client::new();
    let req = client.get("https://example.com/stream");
    let built = auth.apply(req).unwrap().build().unwrap();

    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Bearer my-token"
    );
    assert!(built.headers().get("Authorization").unwrap().is_sensitive());
}

#[test]
fn test_empty_credential_still_sent() {
    let auth = Authenticator::new(Credential::default());

    let client = reqwest::Client::new();
    let req = client.get("https://example.com/stream");
    let built = auth.apply(req).unwrap().build().unwrap();

    assert!(built.headers().contains_key("Authorization"));
}

#[test]
fn test_invalid_token_rejected() {
    let auth = Authenticator::new(Credential::bearer("bad\ntoken"));
    let err = auth.header_value().unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
}
