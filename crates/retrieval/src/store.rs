//! Persistent collections of embedded records.
//!
//! `JsonlCollection` keeps one JSON-encoded `StoredRecord` per line in
//! `<persist_directory>/<collection>.jsonl`. Records are loaded into memory
//! on open and the file is rewritten on every mutation, which gives fast
//! reads with durable writes for corpora of a few thousand chunks.

use crate::document::StoredRecord;
use crate::vector::nearest;
use async_trait::async_trait;
use celsia_core::error::RetrievalError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Storage behind a `VectorIndex`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by id. Returns the number written.
    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<usize, RetrievalError>;

    /// The `limit` records most similar to `embedding`, with their cosine similarity.
    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(StoredRecord, f32)>, RetrievalError>;

    async fn count(&self) -> Result<usize, RetrievalError>;

    async fn clear(&self) -> Result<(), RetrievalError>;
}

/// In-memory record table with an id → position index.
#[derive(Default)]
struct Table {
    records: Vec<StoredRecord>,
    positions: HashMap<String, usize>,
}

impl Table {
    fn from_records(records: Vec<StoredRecord>) -> Self {
        let mut table = Self::default();
        table.upsert(records);
        table
    }

    fn upsert(&mut self, records: Vec<StoredRecord>) -> usize {
        let n = records.len();
        for record in records {
            match self.positions.get(&record.id) {
                Some(&pos) => self.records[pos] = record,
                None => {
                    self.positions.insert(record.id.clone(), self.records.len());
                    self.records.push(record);
                }
            }
        }
        n
    }

    fn search(&self, embedding: &[f32], limit: usize) -> Vec<(StoredRecord, f32)> {
        nearest(&self.records, embedding, limit)
            .into_iter()
            .map(|(i, sim)| (self.records[i].clone(), sim))
            .collect()
    }

    fn clear(&mut self) {
        self.records.clear();
        self.positions.clear();
    }
}

/// A named collection persisted as JSON lines.
pub struct JsonlCollection {
    path: PathBuf,
    table: RwLock<Table>,
}

impl JsonlCollection {
    /// Open `<dir>/<collection>.jsonl`; a missing file starts empty.
    pub fn open(dir: &Path, collection: &str) -> Self {
        let path = dir.join(format!("{collection}.jsonl"));
        let records = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = records.len(), "Collection loaded");
        Self {
            path,
            table: RwLock::new(Table::from_records(records)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<StoredRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<StoredRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted collection record");
                    None
                }
            })
            .collect()
    }

    fn flush(&self, table: &Table) -> Result<(), RetrievalError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RetrievalError::Storage(format!("Failed to create collection directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for record in &table.records {
            let line = serde_json::to_string(record).map_err(|e| {
                RetrievalError::Storage(format!("Failed to serialize record: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, content)
            .map_err(|e| RetrievalError::Storage(format!("Failed to write collection file: {e}")))
    }
}

#[async_trait]
impl VectorStore for JsonlCollection {
    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<usize, RetrievalError> {
        let mut table = self.table.write().await;
        let n = table.upsert(records);
        self.flush(&table)?;
        Ok(n)
    }

    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(StoredRecord, f32)>, RetrievalError> {
        Ok(self.table.read().await.search(embedding, limit))
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.table.read().await.records.len())
    }

    async fn clear(&self) -> Result<(), RetrievalError> {
        let mut table = self.table.write().await;
        table.clear();
        self.flush(&table)
    }
}

/// Non-persistent collection, for tests and ephemeral indexes.
#[derive(Default)]
pub struct MemoryCollection {
    table: RwLock<Table>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryCollection {
    async fn upsert(&self, records: Vec<StoredRecord>) -> Result<usize, RetrievalError> {
        Ok(self.table.write().await.upsert(records))
    }

    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(StoredRecord, f32)>, RetrievalError> {
        Ok(self.table.read().await.search(embedding, limit))
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.table.read().await.records.len())
    }

    async fn clear(&self) -> Result<(), RetrievalError> {
        self.table.write().await.clear();
        Ok(())
    }
}
