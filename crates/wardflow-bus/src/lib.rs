//! # Wardflow Bus
//!
//! Conversation-ordered communication between agents.
//!
//! The bus is the single sequencer for every conversation: sequence numbers
//! are assigned at publish time under a per-conversation lock, all
//! subscribers observe the same relative order, and the guardrail-backed
//! filter can withhold delivery of flagged content without disturbing the
//! numbering.

pub mod bus;
pub mod error;
pub mod in_memory;
pub mod message;

pub use bus::{AgentBus, GuardrailFilter, MessageFilter, MessageStream, NoopFilter};
pub use error::{BusError, BusResult};
pub use in_memory::InMemoryBus;
pub use message::{Message, MessageDraft, MessageId, MessagePayload};
