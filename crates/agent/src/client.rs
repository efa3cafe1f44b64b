//! Remote agent abstraction and turn types.
//!
//! This module defines the contract the conversation layer consumes: create a
//! session under a label, then open a streamed turn within that session.

use concierge_core::AppResult;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

/// Opaque session identifier issued by the remote agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a message sent within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// A message sent to the agent as part of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: Role,
    pub content: String,
}

impl TurnMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body for a new turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Messages making up the turn
    pub messages: Vec<TurnMessage>,

    /// Request streamed delivery
    #[serde(default)]
    pub stream: bool,
}

impl TurnRequest {
    /// A streamed turn whose only message is the user's query.
    pub fn user_query(query: impl Into<String>) -> Self {
        Self {
            messages: vec![TurnMessage::user(query)],
            stream: true,
        }
    }
}

/// One event received while a turn streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental fragment of the answer
    DeltaChunk { text: String },

    /// Complete answer emitted when the turn finishes
    FinalMessage { text: String },

    /// Any other event; carries the event type when one was present
    Unknown { event_type: Option<String> },
}

impl StreamEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        Self::DeltaChunk { text: text.into() }
    }

    pub fn final_message(text: impl Into<String>) -> Self {
        Self::FinalMessage { text: text.into() }
    }

    pub fn unknown(event_type: Option<&str>) -> Self {
        Self::Unknown {
            event_type: event_type.map(str::to_string),
        }
    }
}

/// Forward-only, single-pass stream of turn events.
pub type TurnStream = Pin<Box<dyn Stream<Item = AppResult<StreamEvent>> + Send>>;

/// Trait for remote reasoning agents.
///
/// Implementations are bound to one agent configuration (model, instructions,
/// retrieval tools) and hand out sessions and turns for it.
#[async_trait::async_trait]
pub trait RemoteAgent: Send + Sync {
    /// Get the provider name (e.g., "llama-stack").
    fn provider_name(&self) -> &str;

    /// Create a new session under `label`.
    ///
    /// Fails with `AppError::Connection` when the agent is unreachable or
    /// rejects the session.
    async fn create_session(&self, label: &str) -> AppResult<SessionId>;

    /// Open a streamed turn within `session`.
    ///
    /// Fails with `AppError::Dispatch` when the agent rejects the turn. Errors
    /// while the returned stream is consumed surface as `AppError::Stream` items.
    async fn create_turn(&self, session: &SessionId, request: &TurnRequest)
        -> AppResult<TurnStream>;
}
