//! Transport abstraction
//!
//! A transport performs one authenticated GET against the stream endpoint
//! and yields the status code plus the body as a byte stream.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::StreamExt;

/// Streamed response body
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// One opened streaming response
pub struct StreamResponse {
    /// HTTP status code
    pub status: u16,
    /// Body chunks in arrival order
    pub body: BodyStream,
}

impl StreamResponse {
    /// Create a response from a status and a body stream
    pub fn new(status: u16, body: BodyStream) -> Self {
        Self { status, body }
    }

    /// Create a response whose body is the given chunks
    pub fn from_chunks<I, B>(status: u16, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        let body = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<Bytes, Error>(c.into())),
        )
        .boxed();
        Self { status, body }
    }

    /// Whether the status is 200 OK
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Drain the body into a string (lossy UTF-8)
    pub async fn text(mut self) -> Result<String> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Capability that opens the stream endpoint
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Issue the streaming GET and return as soon as headers arrive
    async fn open(&self) -> Result<StreamResponse>;
}
