//! # Celsia Core
//!
//! Domain types, traits, and error definitions for the Celsia customer
//! support agent. This crate has no I/O of its own; it defines the model
//! every other crate implements against.
//!
//! - [`Provider`]: language and embedding engines
//! - [`Tool`] / [`ToolRegistry`]: capabilities the agent can invoke
//! - [`Message`] / [`Session`]: conversation history

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, RetrievalError, ToolError};
pub use message::{Message, MessageToolCall, Role, Session, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, SamplingParams, ToolDefinition};
pub use tool::{SideEffect, Tool, ToolCall, ToolRegistry, ToolRegistryBuilder, ToolResult};
