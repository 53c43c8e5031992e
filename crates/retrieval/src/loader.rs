//! Corpus loading: JSON files → cleaned, chunked `Document`s.
//!
//! Three file shapes are understood:
//! - scraped articles: `{"chunks": [{"content", "source_url", "title", "date", "region", "category", "source_type"}]}`
//! - social posts: `[{"post", "URL imagen/video", "user", "tiempo", "Reacciones", "Interacciones"}]`
//! - a single object carrying `text`, `content` or `post`

use crate::document::{Document, Metadata};
use celsia_core::error::RetrievalError;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Words dropped during cleaning (scraper artefacts).
const NOISE_WORDS: [&str; 2] = ["hashtag", "undefined"];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingOptions {
    /// Maximum characters per chunk
    pub chunk_size: usize,

    /// Characters repeated between consecutive chunks
    pub chunk_overlap: usize,

    /// Chunks shorter than this are discarded
    pub min_chars: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chars: 30,
        }
    }
}

/// Load one corpus file with the default chunking.
pub fn load_documents(path: &Path) -> Result<Vec<Document>, RetrievalError> {
    load_documents_with(path, &ChunkingOptions::default())
}

/// Load one corpus file.
///
/// Document ids are `<file stem>#<n>`, so re-ingesting a file replaces
/// its previous chunks.
pub fn load_documents_with(path: &Path, opts: &ChunkingOptions) -> Result<Vec<Document>, RetrievalError> {
    let invalid = |reason: String| RetrievalError::InvalidCorpus {
        path: path.display().to_string(),
        reason,
    };

    let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let data: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".into());

    let raw = extract_records(&data, &file_name);
    if raw.is_empty() {
        warn!(path = %path.display(), "No documents extracted from corpus file");
    }

    let mut seen = HashSet::new();
    let mut documents = Vec::new();
    for (text, metadata) in raw {
        for chunk in split_text(&clean_text(&text), opts.chunk_size, opts.chunk_overlap) {
            if chunk.chars().count() < opts.min_chars || !is_meaningful(&chunk) {
                continue;
            }
            if !seen.insert(chunk.clone()) {
                continue;
            }
            let mut doc = Document::new(format!("{stem}#{}", documents.len()), chunk);
            doc.metadata = metadata.clone();
            doc.metadata
                .insert("length".into(), Value::from(doc.text.chars().count()));
            documents.push(doc);
        }
    }

    debug!(path = %path.display(), documents = documents.len(), "Corpus file loaded");
    Ok(documents)
}

/// Every `*.json` file directly inside `dir`, in name order.
pub fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>, RetrievalError> {
    let entries = std::fs::read_dir(dir).map_err(|e| RetrievalError::InvalidCorpus {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn extract_records(data: &Value, file_name: &str) -> Vec<(String, Metadata)> {
    match data {
        Value::Object(obj) => match obj.get("chunks") {
            Some(Value::Array(chunks)) => chunks
                .iter()
                .filter_map(|record| {
                    let content = non_empty_str(record.get("content"))?;
                    let mut metadata = Metadata::new();
                    metadata.insert(
                        "source".into(),
                        record
                            .get("source_url")
                            .filter(|v| !v.is_null())
                            .cloned()
                            .unwrap_or_else(|| Value::from(file_name)),
                    );
                    for key in ["title", "date", "region", "category", "source_type"] {
                        copy_field(record, key, key, &mut metadata);
                    }
                    Some((content, metadata))
                })
                .collect(),
            _ => ["text", "content", "post"]
                .iter()
                .find_map(|key| non_empty_str(obj.get(*key)))
                .map(|content| {
                    let mut metadata = Metadata::new();
                    metadata.insert("source".into(), Value::from(file_name));
                    vec![(content, metadata)]
                })
                .unwrap_or_default(),
        },
        Value::Array(posts) => posts
            .iter()
            .filter_map(|record| {
                let content = non_empty_str(record.get("post"))?;
                let mut metadata = Metadata::new();
                metadata.insert(
                    "source".into(),
                    record
                        .get("URL imagen/video")
                        .filter(|v| !v.is_null())
                        .cloned()
                        .unwrap_or_else(|| Value::from(file_name)),
                );
                copy_field(record, "user", "user", &mut metadata);
                copy_field(record, "tiempo", "tiempo", &mut metadata);
                copy_field(record, "Reacciones", "reacciones", &mut metadata);
                copy_field(record, "Interacciones", "interacciones", &mut metadata);
                Some((content, metadata))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
}

fn copy_field(record: &Value, from: &str, to: &str, metadata: &mut Metadata) {
    if let Some(v) = record.get(from).filter(|v| !v.is_null()) {
        metadata.insert(to.into(), v.clone());
    }
}

/// Collapse whitespace and drop scraper noise words.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .filter(|w| {
            let bare = w.trim_matches(|c: char| !c.is_alphanumeric());
            !NOISE_WORDS.iter().any(|n| bare.eq_ignore_ascii_case(n))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split on word boundaries into chunks of at most `chunk_size` characters,
/// repeating up to `overlap` trailing characters at the start of the next.
/// A single word longer than `chunk_size` becomes its own chunk.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let mut end = start;
        let mut len = 0;
        while end < words.len() {
            let add = words[end].chars().count() + usize::from(end > start);
            if len + add > chunk_size && end > start {
                break;
            }
            len += add;
            end += 1;
        }
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }

        let mut next = end;
        let mut carried = 0;
        while next > start + 1 {
            let add = words[next - 1].chars().count() + 1;
            if carried + add > overlap {
                break;
            }
            carried += add;
            next -= 1;
        }
        start = next;
    }

    chunks
}

/// At least three distinct words and one longer than four characters.
fn is_meaningful(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    let distinct: HashSet<&str> = words.iter().copied().collect();
    distinct.len() >= 3 && words.iter().any(|w| w.chars().count() > 4)
}
