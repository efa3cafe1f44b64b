//! Conversation controller.
//!
//! Drives one conversation: creates the session on first use, runs each
//! query as a turn, records completed exchanges, and resets on request.
//!
//! ```text
//! Uninitialized --start / first query--> Ready
//! Ready --submit--> AwaitingResponse --answer or error--> Ready
//! Ready --reset--> Ready
//! ```

use crate::aggregator::StreamAggregator;
use crate::dispatcher::TurnDispatcher;
use crate::session::{Exchange, SessionStore};
use concierge_agent::{RemoteAgent, SessionId};
use concierge_core::config::{DEFAULT_FALLBACK_RESPONSE, DEFAULT_SESSION_LABEL};
use concierge_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No session yet
    Uninitialized,
    /// Session open, no turn in flight
    Ready,
    /// A turn is in flight
    AwaitingResponse,
}

/// Marks a turn in flight; returns the controller to `Ready` when dropped,
/// including when the turn future itself is dropped mid-flight.
struct TurnGuard<'a> {
    state: &'a mut ControllerState,
}

impl<'a> TurnGuard<'a> {
    fn enter(state: &'a mut ControllerState) -> Self {
        *state = ControllerState::AwaitingResponse;
        Self { state }
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        *self.state = ControllerState::Ready;
    }
}

/// Settings for a conversation.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Label sessions are created under
    pub session_label: String,

    /// Upper bound for dispatch plus aggregation of one turn
    pub turn_timeout: Duration,

    /// Answer recorded when a turn yields no text
    pub fallback_response: String,
}

impl ControllerOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            session_label: config.session_label.clone(),
            turn_timeout: config.turn_timeout(),
            fallback_response: config.fallback_response.clone(),
        }
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            session_label: DEFAULT_SESSION_LABEL.to_string(),
            turn_timeout: Duration::from_secs(60),
            fallback_response: DEFAULT_FALLBACK_RESPONSE.to_string(),
        }
    }
}

/// Owns the session store and runs turns one at a time.
pub struct ConversationController {
    store: SessionStore,
    dispatcher: TurnDispatcher,
    aggregator: StreamAggregator,
    session_label: String,
    turn_timeout: Duration,
    state: ControllerState,
}

impl ConversationController {
    pub fn new(agent: Arc<dyn RemoteAgent>, options: ControllerOptions) -> Self {
        Self {
            store: SessionStore::new(Arc::clone(&agent)),
            dispatcher: TurnDispatcher::new(agent),
            aggregator: StreamAggregator::new(options.fallback_response),
            session_label: options.session_label,
            turn_timeout: options.turn_timeout,
            state: ControllerState::Uninitialized,
        }
    }

    pub fn from_config(agent: Arc<dyn RemoteAgent>, config: &AppConfig) -> Self {
        Self::new(agent, ControllerOptions::from_config(config))
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.store.session_id()
    }

    /// Completed exchanges, oldest first.
    pub fn history(&self) -> &[Exchange] {
        self.store.history()
    }

    /// Open the session if none exists yet.
    ///
    /// # Errors
    /// `AppError::Connection` when the agent cannot create a session.
    pub async fn start(&mut self) -> AppResult<SessionId> {
        if let Some(session) = self.store.session_id() {
            return Ok(session.clone());
        }

        let session = self.store.create(&self.session_label).await?;
        self.state = ControllerState::Ready;
        Ok(session)
    }

    /// Run `text` as a turn and record the exchange.
    pub async fn submit_query(&mut self, text: &str) -> AppResult<Exchange> {
        self.submit_query_with(text, |_| {}).await
    }

    /// Run `text` as a turn, calling `on_delta` with each answer fragment.
    ///
    /// On any error the history is left untouched and the controller is
    /// ready for the next query.
    ///
    /// # Errors
    /// - `AppError::Busy` if a turn is already in flight
    /// - `AppError::Connection` if the session cannot be created
    /// - `AppError::Dispatch` if the query is blank or the turn is rejected
    /// - `AppError::Stream` if the stream breaks or the turn times out
    pub async fn submit_query_with<F>(&mut self, text: &str, on_delta: F) -> AppResult<Exchange>
    where
        F: FnMut(&str),
    {
        if self.state == ControllerState::AwaitingResponse {
            return Err(AppError::Busy);
        }

        let query = text.trim();
        if query.is_empty() {
            return Err(AppError::Dispatch("Query must not be empty".to_string()));
        }

        let session = self.start().await?;

        tracing::info!("Submitting query in session {}", session);

        let outcome = {
            let _guard = TurnGuard::enter(&mut self.state);
            let dispatcher = &self.dispatcher;
            let aggregator = &self.aggregator;
            let turn = async {
                let stream = dispatcher.dispatch(&session, query).await?;
                aggregator.aggregate_with(stream, on_delta).await
            };
            tokio::time::timeout(self.turn_timeout, turn).await
        };

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!("Turn failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                tracing::warn!("Turn timed out after {:?}", self.turn_timeout);
                return Err(AppError::Stream(format!(
                    "No complete response within {} seconds",
                    self.turn_timeout.as_secs_f32()
                )));
            }
        };

        let exchange = Exchange::new(query, response);
        self.store.append(exchange.clone());
        tracing::info!(
            "Turn complete ({} exchanges in session)",
            self.store.len()
        );

        Ok(exchange)
    }

    /// Replace the session with a fresh one and clear the history.
    pub async fn reset_conversation(&mut self) -> AppResult<SessionId> {
        match self.store.reset(&self.session_label).await {
            Ok(session) => {
                self.state = ControllerState::Ready;
                Ok(session)
            }
            Err(e) => {
                self.state = ControllerState::Uninitialized;
                Err(e)
            }
        }
    }
}
