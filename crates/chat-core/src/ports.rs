//! Port traits — the hexagonal architecture boundary.
//!
//! These traits are defined here in `chat-core` (pure Rust).
//! The browser implementation lives in `chat-platform`.
//! The core never imports platform code; it only depends on these traits.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use chat_types::Result;

use crate::CancellationToken;

// ─── HTTP Port ───────────────────────────────────────────────

/// Incrementally readable response body. Each item is one underlying read.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>>>>;

/// POST request handed to the HTTP collaborator
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Path relative to the API base URL
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn post_json(path: impl Into<String>, body: String) -> Self {
        Self {
            path: path.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Response whose body has not been read yet
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// `None` when the response carries no readable body
    pub body: Option<ByteStream>,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait(?Send)]
pub trait HttpPort {
    /// Send a request with credentials included.
    ///
    /// Dropping the returned future or the response body must abort the
    /// underlying request; `cancel` lets errors from that abort surface as
    /// [`ChatError::Cancelled`](chat_types::ChatError::Cancelled).
    async fn send(&self, request: HttpRequest, cancel: &CancellationToken) -> Result<HttpResponse>;
}
