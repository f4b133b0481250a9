//! Error types for bus operations

use thiserror::Error;

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Errors that can occur during bus operations
#[derive(Error, Debug)]
pub enum BusError {
    /// The conversation has no history and no subscribers
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// The agent is not subscribed to the conversation
    #[error("Agent '{agent}' is not subscribed to conversation '{conversation}'")]
    NotSubscribed { agent: String, conversation: String },

    /// Message serialization failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Generic error
    #[error("Bus error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::SerializationFailed(err.to_string())
    }
}
