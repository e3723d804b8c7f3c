use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Reciprocal Rank Fusion constant (§4 C6).
    pub rrf_k: f64,
    pub rerank_min_score: f64,
    pub dense_distance_threshold: f64,
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            rerank_min_score: 0.5,
            dense_distance_threshold: 0.8,
            top_k: 8,
        }
    }
}
