//! Maximal marginal relevance over candidate embeddings.

/// Cosine similarity; zero vectors are similar to nothing.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Indices into `candidates` in selection order, at most `k` of them.
///
/// The first pick is the candidate most similar to the query. Each later pick
/// maximizes `lambda * sim(q, d) - (1 - lambda) * max_{s in selected} sim(d, s)`.
/// Ties go to the earlier candidate.
pub fn select(query: &[f32], candidates: &[Vec<f32>], k: usize, lambda: f32) -> Vec<usize> {
    let relevance: Vec<f32> = candidates.iter().map(|c| cosine(query, c)).collect();
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];
    let mut picked = vec![false; candidates.len()];
    let mut selected = Vec::with_capacity(k.min(candidates.len()));

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (i, &rel) in relevance.iter().enumerate() {
            if picked[i] {
                continue;
            }
            let score = if selected.is_empty() {
                rel
            } else {
                lambda * rel - (1.0 - lambda) * redundancy[i]
            };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        let Some((idx, _)) = best else { break };
        picked[idx] = true;
        selected.push(idx);
        for (i, c) in candidates.iter().enumerate() {
            if !picked[i] {
                redundancy[i] = redundancy[i].max(cosine(c, &candidates[idx]));
            }
        }
    }
    selected
}

/// Squared Euclidean distance, the metric both stores report.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
