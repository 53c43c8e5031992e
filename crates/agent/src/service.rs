//! The chat entry point shared by the CLI and the HTTP gateway.

use crate::loop_runner::{AgentLoop, TurnOutcome};
use crate::session::{SessionLog, SessionStore};
use celsia_core::message::SessionId;
use tracing::{Instrument, info_span};

/// Ties the session table, the optional transcript log and the agent loop together.
pub struct ChatService {
    agent: AgentLoop,
    sessions: SessionStore,
    log: Option<SessionLog>,
}

impl ChatService {
    pub fn new(agent: AgentLoop, sessions: SessionStore) -> Self {
        Self {
            agent,
            sessions,
            log: None,
        }
    }

    /// Append every turn to a JSONL transcript and restore sessions from it.
    pub fn with_log(mut self, log: SessionLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer one user message within a session.
    pub async fn chat(&self, session_id: &SessionId, user_message: &str) -> String {
        self.turn(session_id, user_message).await.answer
    }

    /// Like [`chat`](Self::chat), returning the full outcome.
    ///
    /// The session stays locked for the whole turn, so concurrent messages
    /// for the same session are processed in arrival order.
    pub async fn turn(&self, session_id: &SessionId, user_message: &str) -> TurnOutcome {
        let span = info_span!("turn", session_id = %session_id);
        async {
            let mut session = self.sessions.lock(session_id).await;
            if session.is_empty()
                && let Some(log) = &self.log
            {
                let restored = log.read(session_id).await;
                if !restored.is_empty() {
                    tracing::debug!(messages = restored.len(), "Restored session from log");
                    session.extend(restored);
                }
            }

            let outcome = self.agent.run_turn(&session.messages, user_message).await;

            if let Some(log) = &self.log {
                log.append(session_id, &outcome.new_messages).await;
            }
            session.extend(outcome.new_messages.iter().cloned());
            outcome
        }
        .instrument(span)
        .await
    }
}
