//! Maximal marginal relevance re-ranking.

use crate::vector::cosine_similarity;

/// Pick up to `k` candidates trading relevance against redundancy.
///
/// `candidates` must be in original rank order (most relevant first).
/// Each step picks the candidate maximising
/// `lambda * sim(query, c) - (1 - lambda) * max(sim(c, s) for s in selected)`;
/// ties go to the earlier-ranked candidate. Returns indices into
/// `candidates` in selection order.
pub fn select<V: AsRef<[f32]>>(query: &[f32], candidates: &[V], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(candidates.len());
    if k == 0 {
        return Vec::new();
    }
    let lambda = lambda.clamp(0.0, 1.0);

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, c.as_ref()))
        .collect();

    // Highest similarity of each candidate to anything picked so far.
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];
    let mut picked = vec![false; candidates.len()];
    let mut selected = Vec::with_capacity(k);

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (i, rel) in relevance.iter().enumerate() {
            if picked[i] {
                continue;
            }
            let penalty = if selected.is_empty() { 0.0 } else { redundancy[i] };
            let score = lambda * rel - (1.0 - lambda) * penalty;
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        let Some((chosen, _)) = best else { break };
        picked[chosen] = true;
        selected.push(chosen);

        for (i, c) in candidates.iter().enumerate() {
            if !picked[i] {
                let sim = cosine_similarity(candidates[chosen].as_ref(), c.as_ref());
                redundancy[i] = redundancy[i].max(sim);
            }
        }
    }

    selected
}
