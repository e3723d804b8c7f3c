//! Synthesize stage (§4.8): turns the tool-result log plus plan into the
//! final assistant reply.

use agentd_domain::capability::Capability;
use agentd_domain::error::Result;
use agentd_domain::message::{Message, Role};
use agentd_domain::state::ConversationState;

use super::{newest_user_message, Collaborators, GraphContext, Stage, StageOutcome};

const RECENT_TOOL_MESSAGES: usize = 3;

pub async fn run(state: &mut ConversationState, collab: &Collaborators, ctx: &GraphContext) -> Result<StageOutcome> {
    let _ = ctx;
    let question = newest_user_message(&state.messages).map(|m| m.content.clone()).unwrap_or_default();

    let tool_log = recent_tool_messages(&state.messages, RECENT_TOOL_MESSAGES);
    let used_rag = tool_log.iter().any(|m| m.tool_name.as_deref() == Some("rag_retrieve"));

    let mut prompt = vec![Message::system(format!(
        "Produce the final answer to the user's question using the plan and tool results below.\nUser question: {question}\n{}",
        summarize_plan(state),
    ))];
    if used_rag {
        prompt.push(Message::system(
            "Answer only from the knowledge-base contents returned by rag_retrieve; do not invent facts.",
        ));
    }
    for msg in &tool_log {
        prompt.push(msg.clone());
    }

    let (reply, usage) = collab.oracle.complete(&prompt).await?;
    state.usage.accumulate(usage);
    state.messages.push(reply.clone());

    Ok(StageOutcome::Next(Stage::ProfileUpdate))
}

fn recent_tool_messages(messages: &[Message], k: usize) -> Vec<Message> {
    let window_start = messages.iter().rposition(|m| m.role == Role::User).unwrap_or(0);
    messages[window_start..]
        .iter()
        .filter(|m| m.role == Role::Tool)
        .rev()
        .take(k)
        .rev()
        .cloned()
        .collect()
}

fn summarize_plan(state: &ConversationState) -> String {
    if state.plan.is_empty() {
        return "Plan: (none)".to_string();
    }
    if state.plan.len() <= 3 {
        let steps: Vec<String> = state.plan.iter().map(|s| format!("- {}", s.description)).collect();
        format!("Plan:\n{}", steps.join("\n"))
    } else {
        let first = &state.plan[0];
        let last_two = &state.plan[state.plan.len() - 2..];
        format!(
            "Plan:\n- {}\n- ...\n- {}\n- {}",
            first.description, last_two[0].description, last_two[1].description
        )
    }
}
