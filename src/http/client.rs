//! Streaming HTTP client
//!
//! Issues the authenticated GET against the sampled stream endpoint:
//! - Bearer credential and fixed user agent on every request
//! - Connect timeout only; the body is read for as long as the server keeps
//!   the connection open
//! - Body exposed as a stream of chunks, never buffered

use super::transport::{StreamResponse, StreamTransport};
use crate::auth::{Authenticator, Credential};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default stream endpoint
pub const DEFAULT_STREAM_URL: &str =
    "https://api.twitter.com/2/tweets/sample/stream?expansions=author_id";

/// Configuration for the streaming client
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// Stream endpoint
    pub url: String,
    /// Connect timeout (the request itself has no total timeout)
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for StreamClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            user_agent: default_user_agent(),
        }
    }
}

/// Fixed client identifier sent with every request
pub fn default_user_agent() -> String {
    format!("{}/{}", crate::NAME, crate::VERSION)
}

impl StreamClientConfig {
    /// Create a new config builder
    pub fn builder() -> StreamClientConfigBuilder {
        StreamClientConfigBuilder::default()
    }
}

/// Builder for stream client config
#[derive(Default)]
pub struct StreamClientConfigBuilder {
    config: StreamClientConfig,
}

impl StreamClientConfigBuilder {
    /// Set the stream URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> StreamClientConfig {
        self.config
    }
}

/// HTTP client for the sampled stream
pub struct StreamClient {
    client: Client,
    url: Url,
    authenticator: Authenticator,
}

impl StreamClient {
    /// Create a client for the configured endpoint using the given credential
    pub fn new(config: StreamClientConfig, credential: Credential) -> Result<Self> {
        let url = Url::parse(&config.url)?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            url,
            authenticator: Authenticator::new(credential),
        })
    }

    /// The endpoint this client connects to
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl StreamTransport for StreamClient {
    async fn open(&self) -> Result<StreamResponse> {
        let req = self.authenticator.apply(self.client.get(self.url.clone()))?;
        let response = req.send().await?;
        let status = response.status().as_u16();
        debug!(status, url = %self.url, "stream response headers received");

        let body = response.bytes_stream().map_err(Error::Http).boxed();
        Ok(StreamResponse::new(status, body))
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("url", &self.url.as_str())
            .field("credential", self.authenticator.credential())
            .finish_non_exhaustive()
    }
}
