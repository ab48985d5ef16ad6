use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{CompletionMetadata, ExchangeStatus};
use crate::turn::Turn;

/// Server-side conversation context.
///
/// The id stays `None` until the first exchange reports one, and is fixed
/// from then on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the id the first time it is seen. Returns false when an id was
    /// already established; the existing one is kept.
    pub fn establish(&mut self, id: &str) -> bool {
        if self.id.is_some() {
            return false;
        }
        self.id = Some(id.to_string());
        self.started_at = Some(Utc::now());
        true
    }
}

/// Read-only view of a conversation handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub transcript: Vec<Turn>,
    pub status: ExchangeStatus,
    pub session_id: Option<String>,
    pub last_completion: Option<CompletionMetadata>,
}

impl ConversationSnapshot {
    pub fn is_busy(&self) -> bool {
        self.status.is_active()
    }
}
