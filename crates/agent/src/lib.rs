//! The Celsia agent: the decision loop and the state around it.
//!
//! 1. **Receive** a user message for a session
//! 2. **Ask the engine** with the system prompt, the session history and every tool bound
//! 3. **If tool calls**: execute them, append results in request order, ask again
//! 4. **If text**: that is the answer
//!
//! The loop stops at the first text-only response, an engine failure, or
//! the iteration cap; every path yields a user-facing answer.

pub mod bootstrap;
pub mod loop_runner;
pub mod prompts;
pub mod service;
pub mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod test_helpers;

pub use bootstrap::build_chat_service;
pub use loop_runner::{AgentLoop, FailureReason, ModelTurn, TurnOutcome, TurnStatus};
pub use service::ChatService;
pub use session::{SessionLog, SessionStore};
