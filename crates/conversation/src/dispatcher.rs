//! Turn dispatcher.

use concierge_agent::{RemoteAgent, SessionId, TurnRequest, TurnStream};
use concierge_core::{AppError, AppResult};
use std::sync::Arc;

/// Sends one query per turn to the remote agent.
pub struct TurnDispatcher {
    agent: Arc<dyn RemoteAgent>,
}

impl TurnDispatcher {
    pub fn new(agent: Arc<dyn RemoteAgent>) -> Self {
        Self { agent }
    }

    /// Open a streamed turn whose only message is `query`.
    ///
    /// # Errors
    /// `AppError::Dispatch` when the query is blank or the agent rejects the turn.
    pub async fn dispatch(&self, session: &SessionId, query: &str) -> AppResult<TurnStream> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Dispatch("Query must not be empty".to_string()));
        }

        tracing::debug!(
            "Dispatching turn to {} in session {}",
            self.agent.provider_name(),
            session
        );

        self.agent
            .create_turn(session, &TurnRequest::user_query(query))
            .await
            .map_err(|e| match e {
                AppError::Dispatch(_) => e,
                other => AppError::Dispatch(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_agent::{ScriptedAgent, ScriptedTurn, StreamEvent};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_dispatch_sends_single_user_message() {
        let agent = Arc::new(ScriptedAgent::with_turns([ScriptedTurn::Events(vec![
            StreamEvent::delta("Room 4"),
        ])]));
        let dispatcher = TurnDispatcher::new(agent.clone());
        let session = SessionId::new("s-1");

        let events: Vec<_> = dispatcher
            .dispatch(&session, "  Where is the Rust talk?  ")
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(events.len(), 1);

        let requests = agent.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, session);
        assert!(requests[0].1.stream);
        assert_eq!(requests[0].1.messages.len(), 1);
        assert_eq!(requests[0].1.messages[0].content, "Where is the Rust talk?");
    }

    #[tokio::test]
    async fn test_rejected_turn_propagates() {
        let agent = Arc::new(ScriptedAgent::with_turns([ScriptedTurn::Rejected(
            "invalid session".to_string(),
        )]));
        let dispatcher = TurnDispatcher::new(agent);

        let result = dispatcher.dispatch(&SessionId::new("gone"), "hello").await;
        match result {
            Err(AppError::Dispatch(message)) => assert_eq!(message, "invalid session"),
            Err(other) => panic!("Expected dispatch error, got {}", other),
            Ok(_) => panic!("Expected dispatch error, got a stream"),
        }
    }

    #[tokio::test]
    async fn test_blank_query_rejected_without_io() {
        let agent = Arc::new(ScriptedAgent::new());
        let dispatcher = TurnDispatcher::new(agent.clone());

        let result = dispatcher.dispatch(&SessionId::new("s"), "   ").await;
        assert!(matches!(result, Err(AppError::Dispatch(_))));
        assert!(agent.requests().is_empty());
    }
}
