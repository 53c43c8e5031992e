//! Language and embedding engine adapters for the Celsia assistant.
//!
//! All providers implement the `celsia_core::Provider` trait.
//! The router selects the correct provider based on configuration.

mod http;
pub mod ollama;
pub mod openai_compat;
pub mod router;

pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_chat_provider, build_embedding_provider};
