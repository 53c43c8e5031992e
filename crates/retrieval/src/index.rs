//! The vector index: embedding + nearest-neighbour search + MMR.

use crate::document::{Document, RetrievedPassage, StoredRecord};
use crate::mmr;
use crate::store::VectorStore;
use celsia_core::error::RetrievalError;
use celsia_core::provider::{EmbeddingRequest, Provider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Parameters of one similarity query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Passages returned
    pub k: usize,

    /// Nearest neighbours fetched before re-ranking
    pub fetch_k: usize,

    /// MMR trade-off; `None` disables re-ranking
    pub diversity_lambda: Option<f32>,
}

impl QueryOptions {
    /// `k` passages with the default `fetch_k = 4k` and `lambda = 0.5`.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            fetch_k: k.saturating_mul(4),
            diversity_lambda: Some(0.5),
        }
    }

    pub fn with_fetch_k(mut self, fetch_k: usize) -> Self {
        self.fetch_k = fetch_k;
        self
    }

    pub fn with_diversity(mut self, lambda: Option<f32>) -> Self {
        self.diversity_lambda = lambda;
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new(5)
    }
}

/// An embedding-backed similarity index over a `VectorStore`.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
    batch_size: usize,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            store,
            embedder,
            model: model.into(),
            timeout: Duration::from_secs(30),
            batch_size: 32,
        }
    }

    /// Bound every embedding call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn count(&self) -> Result<usize, RetrievalError> {
        self.store.count().await
    }

    /// Embed and store documents, replacing any with the same id.
    pub async fn upsert(&self, documents: Vec<Document>) -> Result<usize, RetrievalError> {
        let documents: Vec<Document> = documents
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .collect();

        let mut written = 0;
        let mut remaining = documents.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<Document> = remaining.by_ref().take(self.batch_size).collect();
            let texts = batch.iter().map(|d| d.text.clone()).collect();
            let embeddings = self.embed(texts).await?;

            let records = batch
                .into_iter()
                .zip(embeddings)
                .map(|(doc, embedding)| StoredRecord::new(doc, embedding))
                .collect();
            written += self.store.upsert(records).await?;
            debug!(written, "Upserted embedding batch");
        }

        info!(written, model = %self.model, "Documents indexed");
        Ok(written)
    }

    /// Retrieve up to `opts.k` passages for `text`.
    ///
    /// An empty collection yields an empty result without calling the
    /// embedding engine; engine failures and timeouts are errors.
    pub async fn query(
        &self,
        text: &str,
        opts: QueryOptions,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        if opts.k == 0 || self.store.count().await? == 0 {
            debug!("Empty collection, nothing to retrieve");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let query_embedding = self
            .embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("empty embedding response".into()))?;

        let fetch_k = opts.fetch_k.max(opts.k);
        let candidates = self.store.search(&query_embedding, fetch_k).await?;

        let chosen: Vec<usize> = match opts.diversity_lambda {
            Some(lambda) => {
                let vectors: Vec<&[f32]> = candidates.iter().map(|(r, _)| r.embedding.as_slice()).collect();
                mmr::select(&query_embedding, &vectors, opts.k, lambda)
            }
            None => (0..candidates.len().min(opts.k)).collect(),
        };

        let passages: Vec<RetrievedPassage> = chosen
            .into_iter()
            .map(|i| {
                let (record, similarity) = &candidates[i];
                RetrievedPassage {
                    text: record.text.clone(),
                    source: record
                        .metadata
                        .get("source")
                        .and_then(|v| v.as_str())
                        .map(String::from)
                        .unwrap_or_else(|| record.id.clone()),
                    score: 1.0 - similarity,
                    metadata: record.metadata.clone(),
                }
            })
            .collect();

        debug!(
            candidates = candidates.len(),
            returned = passages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Retrieval complete"
        );
        Ok(passages)
    }

    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let expected = inputs.len();
        let request = EmbeddingRequest {
            model: self.model.clone(),
            inputs,
        };

        let response = tokio::time::timeout(self.timeout, self.embedder.embed(request))
            .await
            .map_err(|_| RetrievalError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != expected {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "expected {expected} embeddings, got {}",
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}
