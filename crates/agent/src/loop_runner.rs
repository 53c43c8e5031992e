//! The agent reasoning loop.
//!
//! One call to [`AgentLoop::run_turn`] handles one user message:
//!
//! ```text
//! AwaitingModelDecision ──Final──────────────▶ Done
//!        ▲    │
//!        │    └──ToolCalls──▶ ExecutingTools ─┐
//!        └────────────────────────────────────┘
//! ```
//!
//! The loop fails when the engine errors or times out, or when it is still
//! requesting tools after `max_iterations` engine calls. A failed turn
//! still produces a user-facing answer.

use crate::prompts::{FAILED_TURN_FALLBACK, NO_ANSWER_FALLBACK, SYSTEM_PROMPT};
use celsia_core::message::{Message, MessageToolCall, Role};
use celsia_core::provider::{Provider, ProviderRequest, SamplingParams, ToolDefinition};
use celsia_core::tool::{ToolCall, ToolRegistry, ToolResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What the engine decided on one iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// No tool calls: the text is the answer (possibly empty).
    Final(String),
    /// One or more tool calls, with whatever text came alongside.
    ToolCalls {
        text: String,
        calls: Vec<MessageToolCall>,
    },
}

impl ModelTurn {
    pub fn from_message(message: &Message) -> Self {
        if message.tool_calls.is_empty() {
            Self::Final(message.content.clone())
        } else {
            Self::ToolCalls {
                text: message.content.clone(),
                calls: message.tool_calls.clone(),
            }
        }
    }
}

/// Why a turn failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Still requesting tools after the iteration cap
    IterationLimit,
    /// The engine call errored or timed out
    Engine(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    Done,
    Failed(FailureReason),
}

#[derive(Debug)]
enum LoopState {
    AwaitingModelDecision,
    ExecutingTools(Vec<MessageToolCall>),
    Done,
    Failed(FailureReason),
}

/// Result of one user turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// What the user sees
    pub answer: String,
    pub status: TurnStatus,
    /// Everything appended this turn, starting with the user message
    pub new_messages: Vec<Message>,
    /// Engine calls made
    pub iterations: u32,
    pub tool_calls_made: usize,
}

/// The core agent loop that orchestrates engine calls and tool execution.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    model: String,
    sampling: SamplingParams,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: u32,
    llm_timeout: Duration,
    tool_timeout: Duration,
    parallel_tool_calls: bool,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            model: model.into(),
            sampling: SamplingParams::default(),
            max_tokens: None,
            tools,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_iterations: 10,
            llm_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(60),
            parallel_tool_calls: true,
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the maximum number of engine calls per turn (at least one).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Run the calls of one engine turn concurrently (default) or in order.
    pub fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Process one user message against `history` (system prompt excluded).
    ///
    /// Never fails: engine errors, timeouts and the iteration cap all end
    /// in [`TurnStatus::Failed`] with a fallback answer.
    pub async fn run_turn(&self, history: &[Message], user_message: &str) -> TurnOutcome {
        let started = Instant::now();
        let tool_definitions = self.tools.definitions();
        let mut new_messages = vec![Message::user(user_message)];
        let mut iterations = 0u32;
        let mut tool_calls_made = 0usize;

        let mut state = LoopState::AwaitingModelDecision;
        let status = loop {
            state = match state {
                LoopState::AwaitingModelDecision if iterations >= self.max_iterations => {
                    warn!(iterations, "Iteration cap reached with tools still requested");
                    LoopState::Failed(FailureReason::IterationLimit)
                }
                LoopState::AwaitingModelDecision => {
                    iterations += 1;
                    debug!(iteration = iterations, "Agent loop iteration");
                    match self.decide(history, &new_messages, &tool_definitions).await {
                        Ok(message) => {
                            let turn = ModelTurn::from_message(&message);
                            new_messages.push(message);
                            match turn {
                                ModelTurn::Final(_) => LoopState::Done,
                                ModelTurn::ToolCalls { calls, .. } => {
                                    debug!(tool_count = calls.len(), "Executing tool calls");
                                    LoopState::ExecutingTools(calls)
                                }
                            }
                        }
                        Err(reason) => LoopState::Failed(FailureReason::Engine(reason)),
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    tool_calls_made += calls.len();
                    let results = self.execute_tools(&calls).await;
                    for (call, result) in calls.iter().zip(results) {
                        new_messages.push(Message::tool_result(&call.id, &call.name, result.output));
                    }
                    LoopState::AwaitingModelDecision
                }
                LoopState::Done => break TurnStatus::Done,
                LoopState::Failed(reason) => break TurnStatus::Failed(reason),
            };
        };

        let answer = match &status {
            TurnStatus::Done => new_messages
                .iter()
                .rev()
                .find(|m| m.is_assistant_text())
                .map(|m| m.content.trim().to_string())
                .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string()),
            TurnStatus::Failed(_) => {
                new_messages.push(Message::assistant(FAILED_TURN_FALLBACK));
                FAILED_TURN_FALLBACK.to_string()
            }
        };

        info!(
            iterations,
            tool_calls = tool_calls_made,
            status = ?status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Turn complete"
        );

        TurnOutcome {
            answer,
            status,
            new_messages,
            iterations,
            tool_calls_made,
        }
    }

    /// One engine call over system prompt, prior history and this turn so far.
    async fn decide(
        &self,
        history: &[Message],
        turn: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Message, String> {
        let mut messages = Vec::with_capacity(history.len() + turn.len() + 1);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
        messages.extend(turn.iter().cloned());

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            sampling: self.sampling,
            max_tokens: self.max_tokens,
            tools: tools.to_vec(),
        };

        match tokio::time::timeout(self.llm_timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => Ok(response.message),
            Ok(Err(e)) => {
                warn!(provider = self.provider.name(), error = %e, "Language engine call failed");
                Err(e.to_string())
            }
            Err(_) => {
                let secs = self.llm_timeout.as_secs();
                warn!(provider = self.provider.name(), timeout_secs = secs, "Language engine call timed out");
                Err(format!("language engine timed out after {secs}s"))
            }
        }
    }

    /// Results come back in request order whatever the execution order.
    async fn execute_tools(&self, calls: &[MessageToolCall]) -> Vec<ToolResult> {
        if self.parallel_tool_calls && calls.len() > 1 {
            futures::future::join_all(calls.iter().map(|call| self.execute_one(call))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.execute_one(call).await);
            }
            results
        }
    }

    async fn execute_one(&self, call: &MessageToolCall) -> ToolResult {
        let call = ToolCall::from(call);
        let started = Instant::now();

        let result = match tokio::time::timeout(self.tool_timeout, self.tools.execute(&call)).await {
            Ok(result) => result,
            Err(_) => {
                let secs = self.tool_timeout.as_secs();
                warn!(tool = %call.name, timeout_secs = secs, "Tool call timed out");
                ToolResult::failure(format!("Error: the tool '{}' timed out after {secs}s.", call.name))
            }
        };

        debug!(
            tool = %call.name,
            success = result.success,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool executed"
        );
        result
    }
}
