//! Native Ollama provider.
//!
//! Talks to `/api/chat`, `/api/embed` and `/api/tags`. Unlike the
//! OpenAI-compatible shim, the native API accepts `top_k` and returns tool
//! call arguments as JSON objects.

use crate::http::{check_status, client_with_timeout, send_error};
use async_trait::async_trait;
use celsia_core::error::ProviderError;
use celsia_core::message::{Message, MessageToolCall, Role};
use celsia_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// A provider backed by a local (or remote) Ollama server.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/');
        // Accept URLs written for the OpenAI shim as well.
        let base_url = base_url.strip_suffix("/v1").unwrap_or(base_url).to_string();
        Self {
            base_url,
            client: client_with_timeout(Duration::from_secs(120)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = client_with_timeout(timeout);
        self
    }

    fn to_api_messages(messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|m| OllamaMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: m.content.clone(),
                tool_calls: m
                    .tool_calls
                    .iter()
                    .map(|tc| OllamaToolCall {
                        function: OllamaFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect(),
                tool_name: m.tool_name.clone(),
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut options = serde_json::json!({
            "temperature": request.sampling.temperature,
            "top_k": request.sampling.top_k,
            "top_p": request.sampling.top_p,
        });
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = serde_json::json!(max_tokens);
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "stream": false,
            "options": options,
        });

        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(tools);
        }

        body
    }

    fn into_response(resp: OllamaChatResponse) -> ProviderResponse {
        let tool_calls = resp
            .message
            .tool_calls
            .into_iter()
            .map(|tc| MessageToolCall {
                id: format!("call_{}", uuid::Uuid::new_v4()),
                name: tc.function.name,
                arguments: match tc.function.arguments {
                    serde_json::Value::String(raw) => {
                        serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
                    }
                    serde_json::Value::Null => serde_json::json!({}),
                    other => other,
                },
            })
            .collect();

        let usage = match (resp.prompt_eval_count, resp.eval_count) {
            (Some(p), Some(c)) => Some(Usage {
                prompt_tokens: p,
                completion_tokens: c,
                total_tokens: p + c,
            }),
            _ => None,
        };

        ProviderResponse {
            message: Message::assistant_with_tool_calls(
                strip_thinking(&resp.message.content),
                tool_calls,
            ),
            usage,
            model: resp.model,
        }
    }
}

/// Drop `<think>...</think>` blocks emitted by reasoning models.
fn strip_thinking(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending Ollama chat request"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        let response = check_status(response, &request.model).await?;

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        Ok(Self::into_response(parsed))
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({
            "model": request.model,
            "input": request.inputs,
        });

        debug!(model = %request.model, count = request.inputs.len(), "Sending Ollama embed request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        let response = check_status(response, &request.model).await?;

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        if parsed.embeddings.len() != request.inputs.len() {
            return Err(ProviderError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                request.inputs.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(EmbeddingResponse {
            embeddings: parsed.embeddings,
            model: if parsed.model.is_empty() {
                request.model
            } else {
                parsed.model
            },
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(send_error)?;
        Ok(response.status().is_success())
    }
}

// --- Ollama API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: String,
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    model: String,
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_normalization() {
        assert_eq!(OllamaProvider::new("http://localhost:11434/").base_url, DEFAULT_OLLAMA_URL);
        assert_eq!(OllamaProvider::new("http://localhost:11434/v1").base_url, DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn request_body_uses_native_options() {
        let request = ProviderRequest {
            model: "qwen3:4b".into(),
            messages: vec![Message::system("Eres un asistente"), Message::user("Hola")],
            sampling: SamplingParams::default(),
            max_tokens: Some(512),
            tools: vec![ToolDefinition {
                name: "get_phone".into(),
                description: "Phone lines".into(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }],
        };
        let body = OllamaProvider::build_body(&request);
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["top_k"], 40);
        assert_eq!(body["options"]["num_predict"], 512);
        assert_eq!(body["tools"][0]["function"]["name"], "get_phone");
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn tool_results_carry_tool_name() {
        let msgs = OllamaProvider::to_api_messages(&[Message::tool_result(
            "call_1",
            "get_phone",
            "01 8000 112 115",
        )]);
        assert_eq!(msgs[0].role, "tool");
        assert_eq!(msgs[0].tool_name.as_deref(), Some("get_phone"));
    }

    #[test]
    fn parse_chat_response_with_tool_calls() {
        let data = r#"{
            "model": "qwen3:4b",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "check_service_status", "arguments": {"city": "Tuluá"}}},
                    {"function": {"name": "get_phone", "arguments": "{}"}}
                ]
            },
            "done": true,
            "prompt_eval_count": 120,
            "eval_count": 14
        }"#;
        let parsed: OllamaChatResponse = serde_json::from_str(data).unwrap();
        let response = OllamaProvider::into_response(parsed);

        let calls = &response.message.tool_calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments["city"], "Tuluá");
        assert_eq!(calls[1].arguments, serde_json::json!({}));
        assert_ne!(calls[0].id, calls[1].id);
        assert_eq!(response.usage.unwrap().total_tokens, 134);
    }

    #[test]
    fn thinking_blocks_are_stripped() {
        assert_eq!(
            strip_thinking("<think>\nthe user wants the phone\n</think>\n\nLínea: 01 8000"),
            "Línea: 01 8000"
        );
        assert_eq!(strip_thinking("plain"), "plain");
        assert_eq!(strip_thinking("<think>never closed"), "");
    }

    #[test]
    fn parse_embed_response() {
        let data = r#"{"model": "nomic-embed-text", "embeddings": [[0.1, 0.2], [0.3, 0.4]]}"#;
        let parsed: OllamaEmbedResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
    }
}
