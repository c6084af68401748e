//! HTTP module
//!
//! Opens the authenticated streaming GET and hands the body back as a
//! stream of byte chunks.
//!
//! # Features
//!
//! - **Transport seam**: `StreamTransport` lets the ingest loop run against
//!   any source of streamed responses
//! - **Streaming client**: `StreamClient` issues the request with reqwest and
//!   never buffers the body
//! - **Reconnect pacing**: optional token bucket using governor

mod client;
mod rate_limit;
mod transport;

pub use client::{
    default_user_agent, StreamClient, StreamClientConfig, StreamClientConfigBuilder,
    DEFAULT_STREAM_URL,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use transport::{BodyStream, StreamResponse, StreamTransport};
