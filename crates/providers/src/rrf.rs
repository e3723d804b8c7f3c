//! Reciprocal Rank Fusion (§4.6 `hybrid`):
//! `score(d) = Σ_src w_src · 1/(rank_src(d) + K)`, `w_dense = α`,
//! `w_sparse = 1 − α`. Ties broken by source ordering — the doc that
//! appeared earliest across the two input lists (dense scanned first)
//! wins a tie.

use std::collections::HashMap;

use crate::traits::{RetrievedDoc, ScoredDoc};

pub const DEFAULT_K: f64 = 60.0;

struct Accum {
    doc: RetrievedDoc,
    score: f64,
    first_seen: usize,
}

pub fn fuse(dense: Vec<RetrievedDoc>, sparse: Vec<crate::traits::ScoredDoc>, alpha: f64, k: f64, top_k: usize) -> Vec<ScoredDoc> {
    let w_dense = alpha;
    let w_sparse = 1.0 - alpha;
    let mut order = 0usize;
    let mut by_id: HashMap<String, Accum> = HashMap::new();

    for (rank, doc) in dense.into_iter().enumerate() {
        let contribution = w_dense * (1.0 / (rank as f64 + k));
        let entry = by_id.entry(doc.doc_id.clone()).or_insert_with(|| {
            let seen = order;
            order += 1;
            Accum { doc: doc.clone(), score: 0.0, first_seen: seen }
        });
        entry.score += contribution;
    }

    for (rank, scored) in sparse.into_iter().enumerate() {
        let contribution = w_sparse * (1.0 / (rank as f64 + k));
        let doc_id = scored.doc.doc_id.clone();
        let entry = by_id.entry(doc_id).or_insert_with(|| {
            let seen = order;
            order += 1;
            Accum { doc: scored.doc.clone(), score: 0.0, first_seen: seen }
        });
        entry.score += contribution;
    }

    let mut accums: Vec<Accum> = by_id.into_values().collect();
    accums.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.first_seen.cmp(&b.first_seen))
    });

    accums
        .into_iter()
        .take(top_k)
        .map(|a| ScoredDoc { doc: a.doc, score: a.score })
        .collect()
}
