//! Documents going into the index and passages coming out of it.

use serde::{Deserialize, Serialize};

pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A chunk of corpus text ready to be embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier; upserting the same id replaces the record
    pub id: String,

    pub text: String,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata entry, falling back to the id.
    pub fn source(&self) -> String {
        self.metadata
            .get("source")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| self.id.clone())
    }
}

/// A document persisted together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

impl StoredRecord {
    pub fn new(doc: Document, embedding: Vec<f32>) -> Self {
        Self {
            id: doc.id,
            text: doc.text,
            metadata: doc.metadata,
            embedding,
        }
    }
}

/// One retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,

    /// Where the passage came from (URL or file name)
    pub source: String,

    /// Cosine distance to the query: lower is more similar
    pub score: f32,

    #[serde(default)]
    pub metadata: Metadata,
}
