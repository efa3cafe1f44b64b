//! Session store.
//!
//! Holds the active session id and the ordered exchanges made within it.

use concierge_agent::{RemoteAgent, SessionId};
use concierge_core::{AppError, AppResult};
use serde::Serialize;
use std::sync::Arc;

/// One completed round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    query: String,
    response: String,
}

impl Exchange {
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn response(&self) -> &str {
        &self.response
    }
}

/// Current session and its history.
///
/// History is append-only while the session lives; a reset replaces the
/// session and empties the history together.
pub struct SessionStore {
    agent: Arc<dyn RemoteAgent>,
    session: Option<SessionId>,
    history: Vec<Exchange>,
}

impl SessionStore {
    pub fn new(agent: Arc<dyn RemoteAgent>) -> Self {
        Self {
            agent,
            session: None,
            history: Vec::new(),
        }
    }

    /// Request a new session from the agent and make it current.
    pub async fn create(&mut self, label: &str) -> AppResult<SessionId> {
        let session = self
            .agent
            .create_session(label)
            .await
            .map_err(|e| match e {
                AppError::Connection(_) => e,
                other => AppError::Connection(other.to_string()),
            })?;

        tracing::info!("Session {} created for '{}'", session, label);
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Drop the current session and history, then create a fresh session.
    pub async fn reset(&mut self, label: &str) -> AppResult<SessionId> {
        if let Some(old) = self.session.take() {
            tracing::info!(
                "Discarding session {} with {} exchanges",
                old,
                self.history.len()
            );
        }
        self.history.clear();
        self.create(label).await
    }

    pub fn append(&mut self, exchange: Exchange) {
        self.history.push(exchange);
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
