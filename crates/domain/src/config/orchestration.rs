use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Sliding-window size for `recent_pairs` (§3).
    pub w_recent: usize,
    /// Number of tail turns kept verbatim before older turns are summarized.
    pub top_k_tail: usize,
    pub max_loops: u32,
    pub max_tool_attempts: u32,
    pub max_structured_retries: u32,
    pub max_tool_output_bytes: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            w_recent: 16,
            top_k_tail: 6,
            max_loops: 10,
            max_tool_attempts: 2,
            max_structured_retries: 3,
            max_tool_output_bytes: 64 * 1024,
        }
    }
}
