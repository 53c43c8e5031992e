//! Tool trait and registry: the capabilities the agent can invoke.
//!
//! Tools are registered once at startup through [`ToolRegistryBuilder`] and
//! the resulting [`ToolRegistry`] is immutable and shared read-only across
//! concurrent sessions.
//!
//! The registry is the boundary where heterogeneous tool failures become
//! conversation text: [`ToolRegistry::execute`] never returns an error. An
//! unknown tool name, a schema violation, a tool's own error or a panic
//! all come back as a failed [`ToolResult`] whose output names the tool, so
//! the language engine can read it and self-correct on the next turn.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};
use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

impl From<&MessageToolCall> for ToolCall {
    fn from(tc: &MessageToolCall) -> Self {
        Self {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments: tc.arguments.clone(),
        }
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content (what the language engine reads)
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: false,
            output: output.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    fn for_call(mut self, call_id: &str) -> Self {
        self.call_id = call_id.to_string();
        self
    }
}

/// Whether invoking a tool touches shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideEffect {
    /// Same input, same output; no shared state.
    Pure,
    /// Reads or mutates shared state (e.g. the ticket table).
    Stateful,
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_phone").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Side-effect classification.
    fn side_effect(&self) -> SideEffect {
        SideEffect::Pure
    }

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

type ToolFn = dyn Fn(Value) -> std::result::Result<ToolResult, ToolError> + Send + Sync;

/// A tool backed by a plain synchronous function.
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    side_effect: SideEffect,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        side_effect: SideEffect,
        func: F,
    ) -> Self
    where
        F: Fn(Value) -> std::result::Result<ToolResult, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            side_effect,
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    fn side_effect(&self) -> SideEffect {
        self.side_effect
    }

    async fn execute(&self, arguments: Value) -> std::result::Result<ToolResult, ToolError> {
        (self.func)(arguments)
    }
}

/// Collects tools and produces an immutable [`ToolRegistry`].
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool implementation.
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    /// Add a function-backed tool from its (name, description, schema, function) parts.
    pub fn function<F>(
        self,
        name: &str,
        description: &str,
        schema: Value,
        side_effect: SideEffect,
        func: F,
    ) -> Self
    where
        F: Fn(Value) -> std::result::Result<ToolResult, ToolError> + Send + Sync + 'static,
    {
        self.tool(FnTool::new(name, description, schema, side_effect, func))
    }

    /// Freeze the registry. Fails on a duplicate tool name.
    pub fn build(self) -> std::result::Result<ToolRegistry, ToolError> {
        let mut index = HashMap::with_capacity(self.tools.len());
        for (i, tool) in self.tools.iter().enumerate() {
            if index.insert(tool.name().to_string(), i).is_some() {
                return Err(ToolError::DuplicateName(tool.name().to_string()));
            }
        }
        Ok(ToolRegistry {
            tools: self.tools,
            index,
        })
    }
}

/// An immutable registry of available tools, in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    /// A registry with no tools.
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call. Every failure is folded into the returned result.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "Language engine requested an unknown tool");
            return ToolResult::failure(format!(
                "Error: the tool '{}' does not exist. Available tools: {}.",
                call.name,
                self.names().join(", ")
            ))
            .for_call(&call.id);
        };

        let arguments = match validate_arguments(&tool.parameters_schema(), &call.arguments) {
            Ok(arguments) => arguments,
            Err(reason) => {
                debug!(tool = %call.name, reason = %reason, "Tool arguments rejected");
                return invalid_arguments(&call.name, &reason).for_call(&call.id);
            }
        };

        match AssertUnwindSafe(tool.execute(arguments)).catch_unwind().await {
            Ok(Ok(result)) => result.for_call(&call.id),
            Ok(Err(ToolError::InvalidArguments(reason))) => {
                invalid_arguments(&call.name, &reason).for_call(&call.id)
            }
            Ok(Err(e)) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::failure(format!("Error: the tool '{}' failed: {e}", call.name))
                    .for_call(&call.id)
            }
            Err(_) => {
                warn!(tool = %call.name, "Tool panicked during execution");
                ToolResult::failure(format!(
                    "Error: the tool '{}' failed unexpectedly.",
                    call.name
                ))
                .for_call(&call.id)
            }
        }
    }
}

fn invalid_arguments(tool_name: &str, reason: &str) -> ToolResult {
    ToolResult::failure(format!(
        "Error: invalid arguments for '{tool_name}': {reason}"
    ))
}

/// Check `arguments` against a tool's JSON Schema.
///
/// Integers and numbers sent as numeric strings (and numbers sent where a
/// string is expected) are coerced first, since small models often quote
/// them. A missing or `null` argument object counts as `{}`. Returns the
/// coerced argument object.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> std::result::Result<Value, String> {
    let mut object = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => return Err(format!("expected a JSON object, got {}", json_type(other))),
    };

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (field, spec) in properties {
            let Some(value) = object.get_mut(field) else {
                continue;
            };
            if let Some(coerced) = coerce(spec, value) {
                *value = coerced;
            }
        }
    }

    let instance = Value::Object(object);
    let validator = jsonschema::validator_for(schema).map_err(|e| format!("invalid tool schema: {e}"))?;
    if let Some(error) = validator.iter_errors(&instance).next() {
        let path = error.instance_path.to_string();
        return Err(if path.is_empty() {
            error.to_string()
        } else {
            format!("'{}': {error}", path.trim_start_matches('/'))
        });
    }
    Ok(instance)
}

/// The coerced form of `value` for the property's declared type, if any.
fn coerce(spec: &Value, value: &Value) -> Option<Value> {
    match (spec.get("type").and_then(Value::as_str)?, value) {
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("integer", Value::Number(n)) if !(n.is_i64() || n.is_u64()) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| Value::from(f as i64)),
        ("integer", Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        ("number", Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
