//! Deterministic stub `LlmOracle`/`Retriever` implementations used by the
//! orchestration graph's own test suite (§8 seed scenarios) — not wired
//! into production `serve`.

use agentd_domain::capability::Capability;
use agentd_domain::error::Result;
use agentd_domain::message::{Message, Usage};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::traits::{LlmOracle, RetrievedDoc, Retriever, ScoredDoc, StructuredRequest, StructuredResult};

/// Replays a fixed sequence of assistant messages, one per call, looping on
/// the final entry if called more times than scripted.
pub struct ScriptedOracle {
    responses: Mutex<Vec<Message>>,
    cursor: Mutex<usize>,
}

impl ScriptedOracle {
    pub fn new(responses: Vec<Message>) -> Self {
        Self { responses: Mutex::new(responses), cursor: Mutex::new(0) }
    }

    fn next_message(&self) -> Message {
        let responses = self.responses.lock();
        let mut cursor = self.cursor.lock();
        let idx = (*cursor).min(responses.len().saturating_sub(1));
        *cursor += 1;
        responses[idx].clone()
    }
}

#[async_trait]
impl LlmOracle for ScriptedOracle {
    async fn complete(&self, _messages: &[Message]) -> Result<(Message, Usage)> {
        Ok((self.next_message(), Usage::new(10, 10)))
    }

    async fn complete_structured(&self, _messages: &[Message], req: StructuredRequest<'_>) -> Result<StructuredResult> {
        let msg = self.next_message();
        let usage = Usage::new(10, 10);
        match serde_json::from_str::<serde_json::Value>(&msg.content) {
            Ok(value) => Ok(StructuredResult { value, raw_message: msg, used_default: false, usage }),
            Err(_) => Ok(StructuredResult { value: req.default_on_failure, raw_message: msg, used_default: true, usage }),
        }
    }

    async fn complete_with_tools(&self, _messages: &[Message], _allowed: &[Capability]) -> Result<(Message, Usage)> {
        Ok((self.next_message(), Usage::new(10, 10)))
    }
}

/// Retriever stub returning a caller-provided fixed corpus, unconditionally
/// tolerating empty input (§4.6: "tolerate an absent or empty result set").
pub struct FixedRetriever {
    pub dense_docs: Vec<RetrievedDoc>,
    pub sparse_docs: Vec<ScoredDoc>,
}

impl FixedRetriever {
    pub fn empty() -> Self {
        Self { dense_docs: Vec::new(), sparse_docs: Vec::new() }
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn dense(&self, _query: &str, top_k: usize) -> Result<Vec<RetrievedDoc>> {
        Ok(self.dense_docs.iter().take(top_k).cloned().collect())
    }

    async fn sparse(&self, _query: &str, top_k: usize) -> Result<Vec<ScoredDoc>> {
        Ok(self.sparse_docs.iter().take(top_k).cloned().collect())
    }

    async fn rerank(&self, _query: &str, docs: Vec<RetrievedDoc>, top_n: usize) -> Result<Vec<ScoredDoc>> {
        Ok(docs.into_iter().take(top_n).map(|doc| ScoredDoc { doc, score: 1.0 }).collect())
    }

    async fn rewrite_query(&self, original: &str, _failure_reason: &str) -> Result<String> {
        Ok(format!("{original} (refined)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_oracle_loops_on_final_response() {
        let oracle = ScriptedOracle::new(vec![Message::assistant("only")]);
        let (m1, _) = oracle.complete(&[]).await.unwrap();
        let (m2, _) = oracle.complete(&[]).await.unwrap();
        assert_eq!(m1.content, "only");
        assert_eq!(m2.content, "only");
    }

    #[tokio::test]
    async fn fixed_retriever_tolerates_empty_corpus() {
        let retriever = FixedRetriever::empty();
        let hits = retriever.dense("anything", 5).await.unwrap();
        assert!(hits.is_empty());
        let hybrid = retriever.hybrid("anything", 5, 0.5).await.unwrap();
        assert!(hybrid.is_empty());
    }
}
