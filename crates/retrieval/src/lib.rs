//! Retrieval subsystem for the Celsia assistant.
//!
//! A `VectorIndex` embeds documents through a `Provider`, keeps them in a
//! `VectorStore` and answers similarity queries with optional maximal
//! marginal relevance re-ranking.

pub mod document;
pub mod index;
pub mod loader;
pub mod mmr;
pub mod store;
pub mod vector;

pub use document::{Document, Metadata, RetrievedPassage, StoredRecord};
pub use index::{QueryOptions, VectorIndex};
pub use loader::{ChunkingOptions, corpus_files, load_documents};
pub use store::{JsonlCollection, MemoryCollection, VectorStore};
pub use vector::cosine_similarity;
