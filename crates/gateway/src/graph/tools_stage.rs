//! Tools stage (§4.8): executes the last assistant message's tool calls,
//! suspending for human approval when any of them are blacklisted (§4.5).

use agentd_domain::error::Result;
use agentd_domain::message::{Message, Role, ToolCall};
use agentd_domain::state::ConversationState;
use agentd_tools::approval::{ApprovalDecision, PendingApproval};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{Collaborators, GraphContext, Stage, StageOutcome};

pub async fn run(state: &mut ConversationState, collab: &Collaborators, ctx: &GraphContext) -> Result<StageOutcome> {
    let calls = match last_assistant_tool_calls(&state.messages) {
        Some(calls) if !calls.is_empty() => calls,
        _ => return Ok(StageOutcome::Next(Stage::Act)),
    };

    if let Some(resume) = &ctx.resume {
        return resolve_resume(state, collab, calls, resume).await;
    }

    let (allowed, blacklisted): (Vec<ToolCall>, Vec<ToolCall>) =
        calls.into_iter().partition(|c| !collab.tools.is_blacklisted(&c.name));

    if !blacklisted.is_empty() {
        let (tx, rx) = oneshot::channel();
        let thread_key = format!("{}:{}", ctx.user_id, ctx.thread_id);
        let pending = PendingApproval {
            id: Uuid::new_v4(),
            thread_key,
            blacklisted_calls: blacklisted.clone(),
            created_at: chrono::Utc::now(),
            respond: tx,
        };
        let info = collab.approvals.insert(pending);
        let approval_id = info.id;
        // The resolving RPC call drives the decision in; this task does not
        // await `rx` itself — resumption re-enters the graph at `Stage::Tools`
        // with `GraphContext.resume` set (§9: suspend/resume protocol).
        drop(rx);

        run_allowed(state, collab, &allowed).await;

        return Ok(StageOutcome::AwaitingApproval { approval_id });
    }

    run_allowed(state, collab, &allowed).await;
    if !allowed.is_empty() {
        state.tool_attempts += 1;
    }

    Ok(StageOutcome::Next(Stage::Act))
}

async fn resolve_resume(
    state: &mut ConversationState,
    collab: &Collaborators,
    calls: Vec<ToolCall>,
    resume: &super::ResumeAnswer,
) -> Result<StageOutcome> {
    let decision = ApprovalDecision::from_answer(&resume.answer, resume.reason.clone());
    let (allowed, blacklisted): (Vec<ToolCall>, Vec<ToolCall>) =
        calls.into_iter().partition(|c| !collab.tools.is_blacklisted(&c.name));

    match decision {
        ApprovalDecision::Approved => {
            let mut all = allowed;
            all.extend(blacklisted);
            run_allowed(state, collab, &all).await;
            if !all.is_empty() {
                state.tool_attempts += 1;
            }
        }
        ApprovalDecision::Denied { reason } => {
            for call in &blacklisted {
                let text = match &reason {
                    Some(r) => format!("Tool call '{}' was declined by the user: {r}", call.name),
                    None => format!("Tool call '{}' was declined by the user.", call.name),
                };
                state.messages.push(Message::tool_result(call.call_id.clone(), call.name.clone(), text));
            }
            run_allowed(state, collab, &allowed).await;
            state.tool_attempts += 1;
        }
    }

    Ok(StageOutcome::Next(Stage::Act))
}

async fn run_allowed(state: &mut ConversationState, collab: &Collaborators, calls: &[ToolCall]) {
    let max_bytes = collab.config.orchestration.max_tool_output_bytes;
    let mut handles = Vec::with_capacity(calls.len());
    for call in calls {
        let registry = collab.tools.clone();
        let call = call.clone();
        handles.push(tokio::spawn(async move {
            let result = registry.invoke(&call.name, call.args.clone(), max_bytes).await;
            (call, result)
        }));
    }

    for handle in handles {
        if let Ok((call, result)) = handle.await {
            let text = match result {
                Ok(text) => text,
                Err(err) => format!("error: {err}"),
            };
            state.messages.push(Message::tool_result(call.call_id, call.name, text));
        }
    }
}

fn last_assistant_tool_calls(messages: &[Message]) -> Option<Vec<ToolCall>> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .and_then(|m| m.tool_calls.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests_support::{test_collaborators, test_context};

    #[tokio::test]
    async fn no_tool_calls_routes_straight_back_to_act() {
        let collab = test_collaborators();
        let ctx = test_context("go");
        let mut state = ConversationState::default();
        state.messages.push(Message::assistant("no calls here"));

        let outcome = run(&mut state, &collab, &ctx).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Next(Stage::Act)));
    }

    #[tokio::test]
    async fn unknown_tool_produces_an_error_tool_message() {
        let collab = test_collaborators();
        let ctx = test_context("go");
        let mut state = ConversationState::default();
        state.messages.push(Message::assistant_with_tool_calls(
            "",
            vec![ToolCall { call_id: "c1".into(), name: "nonexistent".into(), args: serde_json::json!({}) }],
        ));

        let outcome = run(&mut state, &collab, &ctx).await.unwrap();
        assert!(matches!(outcome, StageOutcome::Next(Stage::Act)));
        assert_eq!(state.tool_attempts, 1);
        let last = state.messages.last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert!(last.content.contains("error:"));
    }

    #[tokio::test]
    async fn blacklisted_call_suspends_with_an_approval_id() {
        let mut collab = test_collaborators();
        collab.tools = std::sync::Arc::new(agentd_tools::ToolRegistry::new(vec!["delete_file".to_string()]));
        let ctx = test_context("go");
        let mut state = ConversationState::default();
        state.messages.push(Message::assistant_with_tool_calls(
            "",
            vec![ToolCall { call_id: "c1".into(), name: "delete_file".into(), args: serde_json::json!({"path": "x"}) }],
        ));

        let outcome = run(&mut state, &collab, &ctx).await.unwrap();
        assert!(matches!(outcome, StageOutcome::AwaitingApproval { .. }));
    }

    #[tokio::test]
    async fn resume_denied_synthesizes_a_refusal_message() {
        let mut collab = test_collaborators();
        collab.tools = std::sync::Arc::new(agentd_tools::ToolRegistry::new(vec!["delete_file".to_string()]));
        let mut ctx = test_context("go");
        ctx.resume = Some(super::super::ResumeAnswer { answer: "n".to_string(), reason: Some("too risky".to_string()) });
        let mut state = ConversationState::default();
        state.messages.push(Message::assistant_with_tool_calls(
            "",
            vec![ToolCall { call_id: "c1".into(), name: "delete_file".into(), args: serde_json::json!({"path": "x"}) }],
        ));

        run(&mut state, &collab, &ctx).await.unwrap();
        let refusal = state.messages.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(refusal.content.contains("too risky"));
    }
}
