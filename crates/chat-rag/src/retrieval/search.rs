//! Exact cosine ranking for the brute-force search path

use crate::types::{RetrievedPassage, StoredPassage};

/// Cosine similarity between two vectors
///
/// Returns `0.0` when either norm is zero or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        0.0
    } else {
        dot / denom
    }
}

/// Score every stored passage against the query and keep the best `top_k`
///
/// Ordering is descending by score; ties keep store order.
pub fn rank_passages(
    query_vector: &[f32],
    stored: Vec<StoredPassage>,
    top_k: usize,
) -> Vec<RetrievedPassage> {
    let mut scored: Vec<(f32, StoredPassage)> = Vec::with_capacity(stored.len());
    for passage in stored {
        if passage.embedding.is_empty() {
            tracing::warn!("Skipping passage {} without an embedding", passage.id);
            continue;
        }
        let score = cosine_similarity(query_vector, &passage.embedding);
        scored.push((score, passage));
    }

    // `sort_by` is stable, so equal scores stay in scan order.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(score, passage)| RetrievedPassage::from_stored(passage, score))
        .collect()
}
