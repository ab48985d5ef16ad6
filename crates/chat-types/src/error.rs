use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("Transport error{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Server error: {reason}")]
    Protocol {
        reason: String,
        code: Option<String>,
    },

    #[error("Cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JS interop error: {0}")]
    JsInterop(String),
}

impl ChatError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        ChatError::Transport {
            status,
            message: message.into(),
        }
    }

    /// Text shown to the user inside a failed turn
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Transport { message, .. } => message.clone(),
            ChatError::Protocol { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

/// Why `send_turn` refused to start an exchange.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    #[error("an exchange is already in flight")]
    Busy,

    #[error("message is empty")]
    EmptyMessage,
}
