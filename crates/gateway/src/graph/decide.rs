//! Decide stage (§4.8): routes to the planning branch or the chat branch.

use agentd_domain::error::Result;
use agentd_domain::state::ConversationState;
use agentd_providers::StructuredRequest;
use serde_json::json;

use super::{newest_user_message, Collaborators, GraphContext, Stage, StageOutcome};

/// Fixed keyword pre-check (§4.8 Decide): any hit short-circuits to the
/// planning branch without spending an LLM call.
const AGENT_KEYWORDS: &[&str] = &[
    "time", "date", "file", "search", "knowledge base", "knowledge-base", "database", "mcp",
];

pub async fn run(state: &mut ConversationState, collab: &Collaborators, ctx: &GraphContext) -> Result<StageOutcome> {
    let question = ctx
        .user_input
        .clone()
        .or_else(|| newest_user_message(&state.messages).map(|m| m.content.clone()))
        .unwrap_or_default();
    let lower = question.to_lowercase();

    let requires_agent = if AGENT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        true
    } else {
        let schema = json!({
            "type": "object",
            "properties": {"requires_agent": {"type": "boolean"}},
            "required": ["requires_agent"],
        });
        let req = StructuredRequest {
            schema,
            default_on_failure: json!({"requires_agent": false}),
            max_retries: collab.config.orchestration.max_structured_retries,
            label: "decide",
        };
        let result = collab.oracle.complete_structured(&state.messages, req).await?;
        state.usage.accumulate(result.usage);
        result
            .value
            .get("requires_agent")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    };

    state.requires_agent = requires_agent;
    let next = if requires_agent { Stage::Plan } else { Stage::Chat };
    Ok(StageOutcome::Next(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests_support::{test_collaborators, test_context};

    #[tokio::test]
    async fn keyword_hit_short_circuits_to_planning_branch() {
        let collab = test_collaborators();
        let ctx = test_context("what time is it?");
        let mut state = ConversationState::default();

        let outcome = run(&mut state, &collab, &ctx).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Next(Stage::Plan)));
        assert!(state.requires_agent);
    }

    #[tokio::test]
    async fn no_keyword_defers_to_structured_llm_call() {
        let collab = test_collaborators();
        let ctx = test_context("tell me a joke");
        let mut state = ConversationState::default();

        let outcome = run(&mut state, &collab, &ctx).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Next(Stage::Chat)));
        assert!(!state.requires_agent);
        assert!(state.usage.total > 0, "the structured call's usage must be accumulated");
    }
}
