//! Message types for conversation-ordered agent communication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wardflow_core::{AgentId, ConversationId};

/// Unique identifier for a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Create a new random message ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message payload - text or structured JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePayload {
    /// String payload
    Text(String),
    /// JSON payload
    Json(serde_json::Value),
}

impl MessagePayload {
    /// Render the payload for content scanning.
    pub fn as_scan_text(&self) -> String {
        match self {
            MessagePayload::Text(s) => s.clone(),
            MessagePayload::Json(v) => v.to_string(),
        }
    }
}

impl From<String> for MessagePayload {
    fn from(s: String) -> Self {
        MessagePayload::Text(s)
    }
}

impl From<&str> for MessagePayload {
    fn from(s: &str) -> Self {
        MessagePayload::Text(s.to_string())
    }
}

impl From<serde_json::Value> for MessagePayload {
    fn from(v: serde_json::Value) -> Self {
        MessagePayload::Json(v)
    }
}

/// A message not yet accepted by the bus.
///
/// Sequence numbers belong to the bus, which is the single sequencer for a
/// conversation: drafts carry everything except the sequence number, which
/// is assigned at publish time.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub sender: AgentId,
    pub payload: MessagePayload,
}

impl MessageDraft {
    pub fn new(sender: impl Into<AgentId>, payload: impl Into<MessagePayload>) -> Self {
        Self {
            sender: sender.into(),
            payload: payload.into(),
        }
    }
}

/// A published message. Immutable once sent; recipients receive copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: MessageId,
    /// Sending agent
    pub sender: AgentId,
    /// Conversation this message belongs to
    pub conversation: ConversationId,
    /// Message payload
    pub payload: MessagePayload,
    /// Monotonic per-conversation sequence number, assigned at publish
    pub sequence: u64,
    /// Timestamp assigned at publish
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub(crate) fn sealed(draft: MessageDraft, conversation: ConversationId, sequence: u64) -> Self {
        Self {
            id: MessageId::new(),
            sender: draft.sender,
            conversation,
            payload: draft.payload,
            sequence,
            timestamp: Utc::now(),
        }
    }

    /// Serialize message to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize message from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
