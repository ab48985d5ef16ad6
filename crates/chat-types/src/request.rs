use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const SESSIONS_PATH: &str = "/chat/sessions";

/// Describes the one HTTP call an exchange makes.
///
/// A conversation without a session id opens with `Create`; every later
/// exchange appends to the session with `Continue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChatRequest {
    Create {
        subject_id: Option<String>,
        topic_id: Option<String>,
        feature: String,
        message: String,
    },
    Continue {
        session_id: String,
        message: String,
    },
}

impl ChatRequest {
    pub fn path(&self) -> String {
        match self {
            ChatRequest::Create { .. } => SESSIONS_PATH.to_string(),
            ChatRequest::Continue { session_id, .. } => {
                format!("{}/{}/messages", SESSIONS_PATH, session_id)
            }
        }
    }

    /// JSON body as the chat API expects it
    pub fn body(&self) -> Value {
        match self {
            ChatRequest::Create {
                subject_id,
                topic_id,
                feature,
                message,
            } => json!({
                "subject_id": subject_id,
                "topic_id": topic_id,
                "feature": feature,
                "message": message,
            }),
            ChatRequest::Continue { message, .. } => json!({ "message": message }),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ChatRequest::Create { message, .. } | ChatRequest::Continue { message, .. } => message,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChatRequest::Create { .. } => "create",
            ChatRequest::Continue { .. } => "continue",
        }
    }

    /// Prefix used in transport error messages
    pub fn failure_context(&self) -> &'static str {
        match self {
            ChatRequest::Create { .. } => "Failed to create session",
            ChatRequest::Continue { .. } => "Failed to send message",
        }
    }
}
