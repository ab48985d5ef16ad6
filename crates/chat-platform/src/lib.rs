//! Browser adapters for the chat-core ports.

pub mod fetch;

pub use fetch::{body_stream, FetchHttpClient};
