//! In-process bus implementation.
//!
//! One task-plus-channel assembly per conversation: a `DashMap` keyed by
//! conversation id holds a per-conversation state behind its own async
//! mutex, so publishes for one conversation serialize (the bus is the
//! single sequencer) while different conversations never contend.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use wardflow_core::{Actor, AgentId, AuditKind, AuditLog, ConversationId};

use crate::bus::{AgentBus, MessageFilter, MessageStream, NoopFilter};
use crate::error::{BusError, BusResult};
use crate::message::{Message, MessageDraft};

struct ConversationState {
    next_seq: u64,
    /// Delivered history, in sequence order. Filtered messages are not
    /// retained: their raw content must never reach an agent, replay
    /// included.
    history: Vec<Message>,
    subscribers: HashMap<AgentId, mpsc::UnboundedSender<Message>>,
}

impl ConversationState {
    fn new() -> Self {
        Self {
            next_seq: 1,
            history: Vec::new(),
            subscribers: HashMap::new(),
        }
    }
}

/// In-memory `AgentBus` with guardrail-backed filtering.
pub struct InMemoryBus {
    conversations: DashMap<ConversationId, Arc<Mutex<ConversationState>>>,
    filter: Arc<dyn MessageFilter>,
    audit: Arc<AuditLog>,
}

impl InMemoryBus {
    /// Bus with no content filtering.
    pub fn new(audit: Arc<AuditLog>) -> Self {
        Self {
            conversations: DashMap::new(),
            filter: Arc::new(NoopFilter),
            audit,
        }
    }

    /// Bus that consults `filter` on every publish.
    pub fn with_filter(audit: Arc<AuditLog>, filter: Arc<dyn MessageFilter>) -> Self {
        Self {
            conversations: DashMap::new(),
            filter,
            audit,
        }
    }

    fn conversation(&self, id: &ConversationId) -> Arc<Mutex<ConversationState>> {
        self.conversations
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new())))
            .value()
            .clone()
    }
}

#[async_trait]
impl AgentBus for InMemoryBus {
    async fn publish(&self, conversation: &ConversationId, draft: MessageDraft) -> BusResult<u64> {
        let state = self.conversation(conversation);
        let mut state = state.lock().await;

        let sequence = state.next_seq;
        state.next_seq += 1;

        let verdict = self
            .filter
            .inspect(&draft.sender, &draft.payload.as_scan_text());
        if verdict.is_deny() {
            // The sequence number is consumed; only delivery is withheld.
            self.audit.record(
                Actor::Agent(draft.sender.clone()),
                AuditKind::MessageFiltered,
                Some(verdict),
                format!("conversation={} sequence={}", conversation, sequence),
            );
            tracing::warn!(
                conversation = %conversation,
                sequence,
                sender = %draft.sender,
                "message filtered"
            );
            return Ok(sequence);
        }

        let message = Message::sealed(draft, conversation.clone(), sequence);
        state.history.push(message.clone());
        state
            .subscribers
            .retain(|_, tx| tx.send(message.clone()).is_ok());

        tracing::debug!(
            conversation = %conversation,
            sequence,
            recipients = state.subscribers.len(),
            "message published"
        );
        Ok(sequence)
    }

    async fn subscribe(
        &self,
        agent: &AgentId,
        conversation: &ConversationId,
    ) -> BusResult<MessageStream> {
        let state = self.conversation(conversation);
        let mut state = state.lock().await;

        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.insert(agent.clone(), tx);
        tracing::debug!(agent = %agent, conversation = %conversation, "subscribed");

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn unsubscribe(&self, agent: &AgentId, conversation: &ConversationId) -> BusResult<()> {
        let state = self
            .conversations
            .get(conversation)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BusError::ConversationNotFound(conversation.to_string()))?;
        let mut state = state.lock().await;

        if state.subscribers.remove(agent).is_none() {
            return Err(BusError::NotSubscribed {
                agent: agent.to_string(),
                conversation: conversation.to_string(),
            });
        }
        Ok(())
    }

    async fn replay(
        &self,
        requester: &AgentId,
        conversation: &ConversationId,
    ) -> BusResult<Vec<Message>> {
        let state = self
            .conversations
            .get(conversation)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BusError::ConversationNotFound(conversation.to_string()))?;
        let state = state.lock().await;

        tracing::debug!(
            requester = %requester,
            conversation = %conversation,
            messages = state.history.len(),
            "replay requested"
        );
        Ok(state.history.clone())
    }

    async fn subscriber_count(&self, conversation: &ConversationId) -> usize {
        // Clone the handle out before awaiting; the map guard must not be
        // held across a suspension point.
        let state = match self.conversations.get(conversation) {
            Some(entry) => entry.value().clone(),
            None => return 0,
        };
        let state = state.lock().await;
        state.subscribers.len()
    }
}
