//! Chat stage (§4.8): the no-tools conversational branch.

use agentd_domain::error::Result;
use agentd_domain::message::{Message, Role};
use agentd_domain::state::ConversationState;

use super::{Collaborators, GraphContext, Stage, StageOutcome};

const IDENTITY_PROMPT: &str = "You are a helpful assistant. Answer directly and concisely.";
const PROFILE_HINT_MAX_CHARS: usize = 300;

pub async fn run(state: &mut ConversationState, collab: &Collaborators, ctx: &GraphContext) -> Result<StageOutcome> {
    let mut prompt = vec![Message::system(IDENTITY_PROMPT)];

    if let Ok(Some(entry)) = ctx.profiles.get("user_memory", &ctx.user_id, "profile") {
        if !entry.memory.is_empty() && entry.memory != "[]" {
            let hint: String = entry.memory.chars().take(PROFILE_HINT_MAX_CHARS).collect();
            prompt.push(Message::system(format!("User profile (for your context only, never quote verbatim): {hint}")));
        }
    }

    if let Some(summary) = state.context.get("summary") {
        prompt.push(Message::system(format!("Conversation summary: {summary}")));
    }

    let w_recent = collab.config.orchestration.w_recent;
    let recent: Vec<Message> = state
        .recent_pairs
        .iter()
        .rev()
        .take(w_recent)
        .rev()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .cloned()
        .collect();
    prompt.extend(recent);

    let trimmed = trim_to_budget(prompt, collab.config.llm.input_token_budget as usize);

    let (reply, usage) = collab.oracle.complete(&trimmed).await?;
    state.usage.accumulate(usage);
    state.messages.push(reply.clone());
    state.recent_pairs.push(reply.clone());
    if state.recent_pairs.len() > w_recent {
        let overflow = state.recent_pairs.len() - w_recent;
        state.recent_pairs.drain(0..overflow);
    }

    Ok(StageOutcome::Next(Stage::ProfileUpdate))
}

/// Trim to `budget` tokens using a last-N strategy that always begins/ends
/// on a user or system message (§4.8 Chat). Falls back to the last original
/// message, or a synthetic notice, if trimming would empty the list.
fn trim_to_budget(messages: Vec<Message>, budget: usize) -> Vec<Message> {
    let mut total: usize = messages.iter().map(|m| super::approx_token_count(&m.content)).sum();
    if total <= budget || messages.is_empty() {
        return messages;
    }

    let original_last = messages.last().cloned();
    let mut kept: Vec<Message> = messages;
    while !kept.is_empty() && total > budget {
        let dropped = kept.remove(0);
        total = total.saturating_sub(super::approx_token_count(&dropped.content));
    }

    while !kept.is_empty() && !matches!(kept.first().map(|m| m.role), Some(Role::User) | Some(Role::System)) {
        kept.remove(0);
    }

    if kept.is_empty() {
        match original_last {
            Some(last) => vec![last],
            None => vec![Message::system("history truncated")],
        }
    } else {
        kept
    }
}
