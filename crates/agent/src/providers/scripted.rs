//! Scripted in-memory agent.

use crate::client::{RemoteAgent, SessionId, StreamEvent, TurnRequest, TurnStream};
use concierge_core::{AppError, AppResult};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// How the agent answers one turn.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Stream these events, then end
    Events(Vec<StreamEvent>),

    /// Stream these events, then fail with a transport error
    BrokenAfter(Vec<StreamEvent>, String),

    /// Reject the turn before any event is streamed
    Rejected(String),

    /// Stream these events, then never yield again
    Stalled(Vec<StreamEvent>),
}

/// Agent that replays scripted turns.
///
/// Used for testing and offline development. Sessions are numbered in
/// creation order; every turn request is recorded for inspection.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<(SessionId, TurnRequest)>>,
    sessions_created: AtomicUsize,
    unreachable: AtomicBool,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an agent answering with `turns` in order.
    pub fn with_turns(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        let agent = Self::new();
        for turn in turns {
            agent.push_turn(turn);
        }
        agent
    }

    /// Queue the answer for a later turn.
    pub fn push_turn(&self, turn: ScriptedTurn) {
        self.turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(turn);
    }

    /// Make session creation fail as if the server were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    /// Turn requests received so far.
    pub fn requests(&self) -> Vec<(SessionId, TurnRequest)> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl RemoteAgent for ScriptedAgent {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn create_session(&self, label: &str) -> AppResult<SessionId> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AppError::Connection(
                "scripted agent is unreachable".to_string(),
            ));
        }

        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionId::new(format!("{}-{}", label, n)))
    }

    async fn create_turn(
        &self,
        session: &SessionId,
        request: &TurnRequest,
    ) -> AppResult<TurnStream> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((session.clone(), request.clone()));

        let turn = self
            .turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| AppError::Dispatch("no scripted turn left".to_string()))?;

        let stream: TurnStream = match turn {
            ScriptedTurn::Events(events) => {
                Box::pin(futures::stream::iter(events.into_iter().map(Ok)))
            }
            ScriptedTurn::BrokenAfter(events, message) => Box::pin(
                futures::stream::iter(events.into_iter().map(Ok))
                    .chain(futures::stream::once(async move {
                        Err(AppError::Stream(message))
                    })),
            ),
            ScriptedTurn::Rejected(message) => return Err(AppError::Dispatch(message)),
            ScriptedTurn::Stalled(events) => Box::pin(
                futures::stream::iter(events.into_iter().map(Ok))
                    .chain(futures::stream::pending()),
            ),
        };

        Ok(stream)
    }
}
