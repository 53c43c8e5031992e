//! `celsia ingest`: load corpus files into the knowledge collection.

use super::load_config;
use celsia_retrieval::{JsonlCollection, VectorStore, corpus_files, load_documents};
use std::path::{Path, PathBuf};

pub async fn run(config_path: Option<&Path>, paths: &[PathBuf], clear: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    if clear {
        JsonlCollection::open(&config.retrieval.persist_directory, &config.retrieval.collection)
            .clear()
            .await?;
        println!("🗑️  Collection '{}' cleared", config.retrieval.collection);
    }

    let files = expand(paths)?;
    if files.is_empty() {
        return Err("No corpus .json files found".into());
    }

    let index = celsia_agent::bootstrap::build_index(&config);
    let mut total = 0;
    for file in &files {
        let documents = load_documents(file)?;
        let loaded = documents.len();
        let written = index.upsert(documents).await?;
        total += written;
        println!("   ✅ {}: {loaded} chunks, {written} indexed", file.display());
    }

    println!();
    println!("📚 Indexed {total} chunks from {} file(s)", files.len());
    println!("   Collection: {} ({} documents)", config.retrieval.collection, index.count().await?);
    Ok(())
}

/// Files as given; directories replaced by their `*.json` files.
fn expand(paths: &[PathBuf]) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(corpus_files(path)?);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_expand_to_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let single = PathBuf::from("extra.json");

        let files = expand(&[dir.path().to_path_buf(), single.clone()]).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("a.json"));
        assert!(files[1].ends_with("b.json"));
        assert_eq!(files[2], single);
    }
}
