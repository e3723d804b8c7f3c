use serde::Serialize;

/// Structured trace events emitted across all agentd crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    StageEntered {
        thread_key: String,
        stage: String,
        loop_count: u32,
    },
    StageCompleted {
        thread_key: String,
        stage: String,
        status: String,
        duration_ms: u64,
    },
    PlanValidated {
        thread_key: String,
        step_count: usize,
        remapped_to_ask_user: usize,
    },
    ToolInvoked {
        thread_key: String,
        tool: String,
        attempt: u32,
        blacklisted: bool,
    },
    ApprovalRequested {
        thread_key: String,
        tool: String,
        approval_id: String,
    },
    ApprovalResolved {
        thread_key: String,
        approval_id: String,
        approved: bool,
    },
    RetrievalCompleted {
        thread_key: String,
        dense_hits: usize,
        sparse_hits: usize,
        fused_hits: usize,
        reranked_hits: usize,
    },
    LlmRequest {
        thread_key: String,
        provider: String,
        model: String,
        structured: bool,
        duration_ms: u64,
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
    },
    LlmStructuredRetry {
        thread_key: String,
        attempt: u32,
        reason: String,
    },
    SessionSuperseded {
        thread_key: String,
        old_request_id: String,
        new_request_id: String,
    },
    SessionCancelled {
        thread_key: String,
        request_id: String,
    },
    CheckpointWritten {
        thread_key: String,
        stage: String,
        bytes: usize,
    },
    ProfileUpdated {
        user_id: String,
        became_empty: bool,
    },
    RateLimitRejected {
        scope: String,
        key: String,
    },
    AuthRejected {
        reason: String,
    },
    LoopLimitReached {
        thread_key: String,
        loop_count: u32,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "agentd_event");
    }
}
