//! Moving requests and responses between caller and host.
//!
//! - [`HttpTransport`]: one HTTP exchange per call through a pooled `reqwest` client
//! - [`LocalTransport`]: hands the request straight to an in-process handler

pub mod local;
pub mod remote;

use std::time::Duration;

use crate::protocol::{HttpRequest, HttpResponse};

pub use local::LocalTransport;
pub use remote::HttpTransport;

/// Transport failure, before any response could be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP exchange failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Body of {length} bytes exceeds the limit of {limit} bytes")]
    BodyTooLarge { length: usize, limit: usize },

    #[error("Exchange timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Performs one request/response exchange.
///
/// Cancellation is the caller's: dropping the returned future abandons the
/// exchange.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}
