//! Summarize stage (§4.8): resets per-request scratch fields, appends the
//! newest user message to the sliding window, and compacts history into a
//! running summary once it grows past budget.

use agentd_domain::error::Result;
use agentd_domain::message::Message;
use agentd_domain::state::ConversationState;

use super::{approx_token_count, Collaborators, GraphContext, Stage, StageOutcome};

pub async fn run(state: &mut ConversationState, collab: &Collaborators, ctx: &GraphContext) -> Result<StageOutcome> {
    state.reset_for_new_request();

    if let Some(input) = &ctx.user_input {
        if !input.trim().is_empty() {
            let user_msg = Message::user(input.clone());
            state.messages.push(user_msg.clone());
            state.context.insert("current_user_question".to_string(), input.clone());

            let w_recent = collab.config.orchestration.w_recent;
            state.recent_pairs.push(user_msg);
            if state.recent_pairs.len() > w_recent {
                let overflow = state.recent_pairs.len() - w_recent;
                state.recent_pairs.drain(0..overflow);
            }
        }
    }

    let budget = collab.config.llm.input_token_budget;
    let total_tokens: usize = state.messages.iter().map(|m| approx_token_count(&m.content)).sum();
    let over_token_budget = total_tokens as f64 > budget as f64 * 0.6;
    let over_window = state.recent_pairs.len() >= collab.config.orchestration.w_recent;

    if over_token_budget || over_window {
        let tail_n = collab.config.orchestration.top_k_tail;
        let tail: Vec<Message> = state.messages.iter().rev().take(tail_n).rev().cloned().collect();

        let summary_input: Vec<Message> = state.messages.iter().take(state.messages.len().saturating_sub(tail_n)).cloned().collect();
        let summary_text = if summary_input.is_empty() {
            String::new()
        } else {
            let mut prompt = vec![Message::system(
                "Summarize the following conversation into a concise paragraph capturing facts and open threads.",
            )];
            prompt.extend(summary_input);
            let (reply, usage) = collab.oracle.complete(&prompt).await?;
            state.usage.accumulate(usage);
            reply.content
        };

        if !summary_text.is_empty() {
            state.context.insert("summary".to_string(), summary_text.clone());
            let mut compacted = vec![Message::system(format!("Conversation summary so far: {summary_text}"))];
            compacted.extend(tail);
            state.messages = compacted;
        }
    }

    Ok(StageOutcome::Next(Stage::Decide))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests_support::{test_collaborators, test_context};

    #[tokio::test]
    async fn below_threshold_messages_are_preserved_exactly() {
        let collab = test_collaborators();
        let ctx = test_context("hello there");
        let mut state = ConversationState::default();

        let outcome = run(&mut state, &collab, &ctx).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Next(Stage::Decide)));
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content, "hello there");
    }

    #[tokio::test]
    async fn resets_scratch_fields_from_a_prior_traversal() {
        let collab = test_collaborators();
        let ctx = test_context("next question");
        let mut state = ConversationState::default();
        state.loop_count = 7;
        state.tool_attempts = 2;

        run(&mut state, &collab, &ctx).await.unwrap();
        assert_eq!(state.loop_count, 0);
        assert_eq!(state.tool_attempts, 0);
    }

    #[tokio::test]
    async fn window_overflow_triggers_compaction_into_summary_plus_tail() {
        let collab = test_collaborators();
        let mut state = ConversationState::default();
        for i in 0..16 {
            state.recent_pairs.push(Message::user(format!("msg {i}")));
            state.messages.push(Message::user(format!("msg {i}")));
        }
        let ctx = test_context("one more");

        run(&mut state, &collab, &ctx).await.unwrap();
        assert!(state.context.contains_key("summary"));
        assert!(state.messages.len() <= collab.config.orchestration.top_k_tail + 1);
    }
}
