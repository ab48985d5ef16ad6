use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of a single turn in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    /// Assistant placeholder, no content received yet
    Pending,
    /// Content chunks are arriving
    Streaming,
    Complete,
    Failed,
    /// Stopped by the user
    Cancelled,
}

impl TurnStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnStatus::Complete | TurnStatus::Failed | TurnStatus::Cancelled
        )
    }
}

/// Client-assigned turn identifier, usable before any server round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single message in the conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub text: String,
    pub status: TurnStatus,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// A finished user turn. User text never changes after creation.
    pub fn user(text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: TurnId::new(),
            role: Role::User,
            text: text.into(),
            status: TurnStatus::Complete,
            created_at,
        }
    }

    /// An empty assistant placeholder waiting for its first chunk.
    pub fn assistant_placeholder(created_at: DateTime<Utc>) -> Self {
        Self {
            id: TurnId::new(),
            role: Role::Assistant,
            text: String::new(),
            status: TurnStatus::Pending,
            created_at,
        }
    }
}

/// Timestamp for the next turn: never earlier than the last one in the transcript.
pub fn next_timestamp(transcript: &[Turn], now: DateTime<Utc>) -> DateTime<Utc> {
    match transcript.last() {
        Some(last) if last.created_at > now => last.created_at,
        _ => now,
    }
}
