use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::turn::Turn;

/// A typed event decoded from one frame of the chat response stream.
///
/// The wire JSON carries a `type` discriminator:
/// `session`, `chunk`, `done`, `error`, `tool_call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// The server-side session now has a durable identifier
    #[serde(rename = "session")]
    SessionStarted { session_id: String },

    /// Incremental assistant text to append
    #[serde(rename = "chunk")]
    ContentChunk { content: String },

    /// Exchange finished successfully
    #[serde(rename = "done")]
    Completed(CompletionMetadata),

    /// Exchange failed on the server; no further frames expected
    #[serde(rename = "error")]
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Informational only
    #[serde(rename = "tool_call")]
    ToolInvoked {
        tool_name: String,
        #[serde(default)]
        tool_input: Value,
    },
}

impl StreamEvent {
    /// `done` and `error` end an exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed(_) | StreamEvent::Failed { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::SessionStarted { .. } => "session",
            StreamEvent::ContentChunk { .. } => "chunk",
            StreamEvent::Completed(_) => "done",
            StreamEvent::Failed { .. } => "error",
            StreamEvent::ToolInvoked { .. } => "tool_call",
        }
    }
}

/// Auxiliary data attached to a `done` event. Never affects transcript text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionMetadata {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
    #[serde(default)]
    pub tool_calls: Vec<Value>,
}

/// Notifications emitted to conversation subscribers after each mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConversationChange {
    /// A turn was appended to the transcript
    TurnAppended { turn: Turn },

    /// Text or status of an existing turn changed
    TurnUpdated { turn: Turn },

    /// The exchange state machine moved
    StatusChanged { status: ExchangeStatus },

    /// The conversation got its server-side identifier
    SessionStarted { session_id: String },

    /// Transcript and session were discarded
    Reset,
}

/// State of the current exchange (one user turn and its streamed reply).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    Idle,
    /// Request issued, nothing received yet
    Dispatched,
    /// Session identified, waiting for the first chunk
    SessionPending,
    Streaming,
    Settled,
    Failed,
    Cancelled,
}

impl ExchangeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExchangeStatus::Settled | ExchangeStatus::Failed | ExchangeStatus::Cancelled
        )
    }

    /// True while an exchange holds the single in-flight slot.
    pub fn is_active(&self) -> bool {
        !matches!(self, ExchangeStatus::Idle) && !self.is_terminal()
    }
}
