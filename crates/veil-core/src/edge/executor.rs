//! Seam to whatever performs the outbound HTTP request.

use std::time::Duration;

use thiserror::Error;

/// One upstream request, fully prepared by the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    /// Absolute http(s) URL.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        super::header_value(&self.headers, name)
    }
}

/// Upstream response as reported by the executor. Redirects are never followed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// The host hid the redirect status and target from the executor.
    pub opaque_redirect: bool,
}

impl FetchResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        super::header_value(&self.headers, name)
    }
}

/// Upstream transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchExecutorError {
    #[error("upstream timed out: {0}")]
    Timeout(String),
    #[error("could not connect upstream: {0}")]
    Connect(String),
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl FetchExecutorError {
    /// Gateway status reported to the client.
    pub fn status(&self) -> u16 {
        match self {
            FetchExecutorError::Timeout(_) => 504,
            _ => 502,
        }
    }
}

/// Performs one request without following redirects.
///
/// Implementations block; call from `spawn_blocking` in async code.
pub trait FetchExecutor: Send + Sync {
    fn execute(&self, request: &FetchRequest) -> Result<FetchResponse, FetchExecutorError>;
}

impl<E: FetchExecutor + ?Sized> FetchExecutor for std::sync::Arc<E> {
    fn execute(&self, request: &FetchRequest) -> Result<FetchResponse, FetchExecutorError> {
        (**self).execute(request)
    }
}
