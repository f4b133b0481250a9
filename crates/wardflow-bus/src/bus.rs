//! Core `AgentBus` trait for conversation-ordered communication.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use wardflow_core::{AgentId, ConversationId, SecurityVerdict};

use crate::error::BusResult;
use crate::message::{Message, MessageDraft};

/// Stream type for receiving messages
pub type MessageStream = Pin<Box<dyn Stream<Item = Message> + Send + 'static>>;

/// Conversation-ordered message routing between agents.
///
/// The bus is the single sequencer for each conversation: all subscribed
/// recipients observe messages in the relative order of the sequence
/// numbers assigned at publish time.
#[async_trait]
pub trait AgentBus: Send + Sync {
    /// Publish a draft to a conversation.
    ///
    /// Returns the sequence number assigned to the message. The sequence
    /// number is consumed even when the content filter withholds delivery.
    async fn publish(&self, conversation: &ConversationId, draft: MessageDraft) -> BusResult<u64>;

    /// Subscribe an agent to a conversation.
    ///
    /// The returned stream yields messages published after subscription;
    /// there is no retroactive delivery.
    async fn subscribe(
        &self,
        agent: &AgentId,
        conversation: &ConversationId,
    ) -> BusResult<MessageStream>;

    /// Remove an agent's subscription. Pending undelivered messages for
    /// that subscription are dropped.
    async fn unsubscribe(&self, agent: &AgentId, conversation: &ConversationId) -> BusResult<()>;

    /// Explicitly requested replay: the full ordered delivered history of a
    /// conversation.
    async fn replay(
        &self,
        requester: &AgentId,
        conversation: &ConversationId,
    ) -> BusResult<Vec<Message>>;

    /// Number of live subscriptions on a conversation.
    async fn subscriber_count(&self, conversation: &ConversationId) -> usize;
}

/// Content filtering seam consulted on every publish.
///
/// Implemented over the security guardrail in production assemblies; a
/// flagged message is withheld from delivery (and audited), never mutated.
pub trait MessageFilter: Send + Sync {
    fn inspect(&self, sender: &AgentId, content: &str) -> SecurityVerdict;
}

/// Filter that allows everything. Used by tests and trusted assemblies.
pub struct NoopFilter;

impl MessageFilter for NoopFilter {
    fn inspect(&self, _sender: &AgentId, _content: &str) -> SecurityVerdict {
        SecurityVerdict::allow()
    }
}

/// Guardrail-backed filter for production assemblies.
///
/// Message content is scanned as inbound traffic; matches accumulate onto
/// the sending agent's risk score like any other flagged content.
pub struct GuardrailFilter {
    guardrail: std::sync::Arc<wardflow_core::SecurityGuardrail>,
}

impl GuardrailFilter {
    pub fn new(guardrail: std::sync::Arc<wardflow_core::SecurityGuardrail>) -> Self {
        Self { guardrail }
    }
}

impl MessageFilter for GuardrailFilter {
    fn inspect(&self, sender: &AgentId, content: &str) -> SecurityVerdict {
        self.guardrail
            .scan(sender, content, wardflow_core::ScanDirection::Inbound)
    }
}
