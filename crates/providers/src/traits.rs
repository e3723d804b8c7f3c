//! `LlmOracle` (C7) and `Retriever` (C6) — the two external collaborator
//! traits the orchestration graph calls into.

use agentd_domain::capability::Capability;
use agentd_domain::error::Result;
use agentd_domain::message::{Message, Usage};
use async_trait::async_trait;
use serde_json::Value;

/// One retrieved document plus source-specific metadata.
#[derive(Debug, Clone)]
pub struct RetrievedDoc {
    pub doc_id: String,
    pub text: String,
    pub metadata: Value,
}

/// A document paired with a relevance score, returned by sparse search,
/// hybrid fusion, or reranking.
#[derive(Debug, Clone)]
pub struct ScoredDoc {
    pub doc: RetrievedDoc,
    pub score: f64,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Already-distance-filtered dense hits.
    async fn dense(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDoc>>;

    async fn sparse(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDoc>>;

    /// Hybrid retrieval via Reciprocal Rank Fusion (see `rrf` module).
    async fn hybrid(&self, query: &str, top_k: usize, alpha: f64) -> Result<Vec<ScoredDoc>> {
        let (dense, sparse) = tokio::try_join!(self.dense(query, top_k), self.sparse(query, top_k))?;
        Ok(crate::rrf::fuse(dense, sparse, alpha, crate::rrf::DEFAULT_K, top_k))
    }

    async fn rerank(&self, query: &str, docs: Vec<RetrievedDoc>, top_n: usize) -> Result<Vec<ScoredDoc>>;

    /// A single retry primitive: given the original query and why it
    /// failed to produce useful results, propose a refined query.
    async fn rewrite_query(&self, original: &str, failure_reason: &str) -> Result<String>;
}

/// Schema + caller-specified fallback for a structured LLM call.
pub struct StructuredRequest<'a> {
    pub schema: Value,
    pub default_on_failure: Value,
    pub max_retries: u32,
    pub label: &'a str,
}

#[derive(Debug, Clone)]
pub struct StructuredResult {
    pub value: Value,
    pub raw_message: Message,
    pub used_default: bool,
    pub usage: Usage,
}

#[async_trait]
pub trait LlmOracle: Send + Sync {
    /// Plain calling pattern: messages → assistant message with usage.
    async fn complete(&self, messages: &[Message]) -> Result<(Message, Usage)>;

    /// Structured calling pattern: up to `req.max_retries` parse attempts
    /// with exponential backoff; on final failure returns
    /// `req.default_on_failure` with `used_default = true`.
    async fn complete_structured(
        &self,
        messages: &[Message],
        req: StructuredRequest<'_>,
    ) -> Result<StructuredResult>;

    /// Tool-bound calling pattern: the assistant message's `tool_calls` may
    /// or may not be populated, depending on whether the model chose to
    /// call a tool from `allowed_capabilities`.
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        allowed_capabilities: &[Capability],
    ) -> Result<(Message, Usage)>;
}
