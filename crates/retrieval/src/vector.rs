//! Vector similarity utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Brute-force nearest-neighbour ranking over stored records

use crate::document::StoredRecord;
use tracing::warn;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank records by cosine similarity to a query embedding.
///
/// Returns `(index, similarity)` pairs sorted by descending similarity,
/// at most `limit` of them. Records whose dimension differs from the
/// query are skipped.
pub fn nearest(records: &[StoredRecord], query: &[f32], limit: usize) -> Vec<(usize, f32)> {
    let mut mismatched = 0usize;
    let mut scored: Vec<(usize, f32)> = records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| {
            if record.embedding.len() != query.len() {
                mismatched += 1;
                return None;
            }
            Some((i, cosine_similarity(&record.embedding, query)))
        })
        .collect();

    if mismatched > 0 {
        warn!(
            skipped = mismatched,
            expected = query.len(),
            "Skipping records with mismatched embedding dimension"
        );
    }

    // Stable sort keeps insertion order among equal scores.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}
