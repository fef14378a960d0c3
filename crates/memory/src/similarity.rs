//! Vector similarity scoring.
//!
//! Pure functions, no allocation beyond the result vector. Accumulation
//! happens in f64 so long vectors do not lose precision in f32 sums.

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal,
/// -1 = opposite. Returns 0.0 if the vectors are empty, mismatched in
/// length, or zero-normed.
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

/// Rank snapshot embeddings by cosine similarity to a query embedding.
///
/// Returns `(index, score)` pairs sorted by descending similarity,
/// truncated to `limit`. Indices refer to positions in `snapshot`, so
/// callers can map hits back onto whatever the snapshot was taken from.
/// Entries whose embedding is empty or mismatched score 0.0 through the
/// `cosine_similarity` guards and sort to the bottom.
pub fn top_k_indices(snapshot: &[Vec<f32>], query_embedding: &[f32], limit: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = snapshot
        .iter()
        .enumerate()
        .map(|(index, embedding)| (index, cosine_similarity(embedding, query_embedding)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}
