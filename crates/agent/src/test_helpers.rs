//! Scripted engines for agent tests and the end-to-end suite.

use celsia_core::error::ProviderError;
use celsia_core::message::{Message, MessageToolCall};
use celsia_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
use std::sync::Mutex;
use std::time::Duration;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next entry in the script. With
/// `repeat_last`, the final entry is returned forever; otherwise running
/// past the end panics. Every request is recorded for inspection.
pub struct SequentialMockProvider {
    script: Vec<Result<ProviderResponse, ProviderError>>,
    repeat_last: bool,
    delay: Duration,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    pub fn from_results(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script,
            repeat_last: false,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<MessageToolCall>, thought: &str, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, thought),
            make_text_response(answer),
        ])
    }

    /// Returns `response` on every call.
    pub fn repeating(response: ProviderResponse) -> Self {
        let mut provider = Self::new(vec![response]);
        provider.repeat_last = true;
        provider
    }

    /// Fails every call with `error`.
    pub fn failing(error: ProviderError) -> Self {
        let mut provider = Self::from_results(vec![Err(error)]);
        provider.repeat_last = true;
        provider
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let entry = {
            let mut requests = self.requests.lock().unwrap();
            let call = requests.len();
            requests.push(request);

            let index = if self.repeat_last {
                call.min(self.script.len().saturating_sub(1))
            } else {
                call
            };
            match self.script.get(index) {
                Some(entry) => entry.clone(),
                None => panic!(
                    "SequentialMockProvider: no more responses (call #{call}, have {})",
                    self.script.len()
                ),
            }
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        entry
    }
}

/// Deterministic bag-of-words embedder: texts sharing words get close vectors.
pub struct FixedEmbedder {
    dimensions: usize,
}

impl FixedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2)
        {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for b in word.to_lowercase().bytes() {
                hash ^= u64::from(b);
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        v
    }
}

impl Default for FixedEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait::async_trait]
impl Provider for FixedEmbedder {
    fn name(&self) -> &str {
        "fixed_embedder"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("fixed_embedder only embeds".into()))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|t| self.vector(t)).collect(),
            model: request.model,
        })
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional accompanying text.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls(thought, tool_calls),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call with id `call_<name>`.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    make_tool_call_with_id(&format!("call_{name}"), name, args)
}

pub fn make_tool_call_with_id(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args,
    }
}
