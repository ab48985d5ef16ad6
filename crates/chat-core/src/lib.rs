//! Client-side engine for streamed chat exchanges.
//!
//! `transport` turns one HTTP response body into ordered [`StreamEvent`]s;
//! `reconciler` folds those events into the conversation transcript.
//!
//! [`StreamEvent`]: chat_types::event::StreamEvent

pub mod decoder;
pub mod event_bus;
pub mod ports;
pub mod reconciler;
pub mod transport;


pub use reconciler::{Conversation, Exchange, ExchangeOutcome};
pub use transport::StreamTransport;
pub use tokio_util::sync::CancellationToken;
