//! Act stage (§4.8): the per-plan-step executor. The densest stage in the
//! graph — prompt assembly, tool-eligibility checks, bad-result detection,
//! and the step-completion rule all live here.

use agentd_domain::capability::Capability;
use agentd_domain::error::Result;
use agentd_domain::message::{Message, Role, ToolCall};
use agentd_domain::state::{ConversationState, PlanStep, StepStatus};
use agentd_providers::ScoredDoc;

use super::{Collaborators, GraphContext, Stage, StageOutcome};

/// Local prompt budget for a single tool message folded into the Act
/// prompt; distinct from the Tool Registry's own `max_tool_output_bytes`
/// truncation of the raw tool result, which already ran at execution time.
const MAX_TOOL_RESULT_TOKENS: usize = 500;

const FAILURE_MARKERS: &[&str] = &["error:", "failed:", "exception:", "not found", "permission denied"];

/// Dense/sparse fusion weight for the hybrid retrieval the rag_retrieve
/// capability runs (§4.6 `hybrid`); even split between the two sources.
const RAG_HYBRID_ALPHA: f64 = 0.5;

pub async fn run(state: &mut ConversationState, collab: &Collaborators, ctx: &GraphContext) -> Result<StageOutcome> {
    let _ = ctx;
    let step = match state.current_step().cloned() {
        Some(step) => step,
        None => {
            state.step_status = StepStatus::PlanDone;
            return Ok(StageOutcome::Next(Stage::Synthesize));
        }
    };

    let max_attempts = collab.config.orchestration.max_tool_attempts;

    // rag_retrieve/rag_rewrite_query are routed through the Retriever (§4.5),
    // not the Tool Registry — no oracle round-trip decides whether to call
    // them, the Act stage calls them directly whenever a retry is still
    // available, then folds a real tool-result message back into context.
    if step.capability.is_rag() && state.tool_attempts < max_attempts {
        return run_rag_step(state, collab, &step).await;
    }

    let mut prompt = vec![Message::system(step_prompt(&step.description, step.capability))];
    if let Some(block) = last_tool_call_block(&state.messages) {
        prompt.extend(block);
    }

    let mut tools_allowed = step.capability.has_tools() && state.tool_attempts < max_attempts;

    if let Some(last_tool_msg) = last_tool_message(&state.messages) {
        if is_bad_tool_result(last_tool_msg, step.capability) {
            prompt.push(Message::system(
                "The previous tool result was empty or unusable; reassess before calling the tool again.",
            ));
        }
    }

    let attempts_exhausted = state.tool_attempts >= max_attempts;

    let (mut reply, usage) = if tools_allowed {
        collab.oracle.complete_with_tools(&prompt, &[step.capability]).await?
    } else {
        collab.oracle.complete(&prompt).await?
    };
    state.usage.accumulate(usage);

    if attempts_exhausted && reply.has_tool_calls() {
        reply.tool_calls = None;
        tools_allowed = false;
    }

    state.messages.push(reply.clone());
    state.loop_count += 1;

    let loop_limit_reached = state.loop_count >= collab.config.orchestration.max_loops;

    let next = if reply.has_tool_calls() && loop_limit_reached {
        // §4.8 routing order: the loop cutoff (ii) outranks a pending tool
        // call (iii) — do not dispatch the call once the limit is hit.
        state.step_status = StepStatus::Fail;
        Stage::Synthesize
    } else if reply.has_tool_calls() {
        state.step_status = StepStatus::Continue;
        Stage::Tools
    } else {
        state.current_step_index += 1;
        state.tool_attempts = 0;
        if state.current_step_index >= state.plan.len() {
            state.step_status = StepStatus::PlanDone;
        } else {
            state.step_status = StepStatus::StepDone;
        }
        route_after_step(state, collab)
    };

    Ok(StageOutcome::Next(next))
}

/// Runs one rag_retrieve/rag_rewrite_query attempt directly against the
/// Retriever (C6) and folds a real tool-call/tool-result pair into the
/// transcript, exactly as a Tool Registry call would, before looping the
/// step back through Act so the oracle can see the result (§4.6, §4.8).
async fn run_rag_step(state: &mut ConversationState, collab: &Collaborators, step: &PlanStep) -> Result<StageOutcome> {
    let last_tool = last_tool_message(&state.messages).cloned();
    let query = &step.description;

    let (tool_name, content) = match step.capability {
        Capability::RagRewriteQuery => {
            let refined = collab
                .retriever
                .rewrite_query(query, "refine the search query called for by the current plan step")
                .await?;
            ("rag_rewrite_query", refined)
        }
        Capability::RagRetrieve => {
            let already_refined = matches!(&last_tool, Some(m) if m.tool_name.as_deref() == Some("rag_rewrite_query"));
            if !already_refined && matches!(&last_tool, Some(m) if is_bad_tool_result(m, Capability::RagRetrieve)) {
                let refined = collab
                    .retriever
                    .rewrite_query(query, "the previous retrieval returned no usable results")
                    .await?;
                ("rag_rewrite_query", refined)
            } else {
                let effective_query = if already_refined { last_tool.as_ref().unwrap().content.clone() } else { query.clone() };
                let top_k = collab.config.retrieval.top_k;
                let docs = collab.retriever.hybrid(&effective_query, top_k, RAG_HYBRID_ALPHA).await?;
                ("rag_retrieve", rag_result_json(&docs))
            }
        }
        _ => unreachable!("run_rag_step is only called for rag capabilities"),
    };

    let call_id = format!("rag-{}", state.loop_count);
    state.messages.push(Message::assistant_with_tool_calls(
        "",
        vec![ToolCall { call_id: call_id.clone(), name: tool_name.to_string(), args: serde_json::json!({"query": query}) }],
    ));
    state.messages.push(Message::tool_result(call_id, tool_name, content));
    state.tool_attempts += 1;
    state.loop_count += 1;
    state.step_status = StepStatus::Continue;

    if state.loop_count >= collab.config.orchestration.max_loops {
        state.step_status = StepStatus::Fail;
        return Ok(StageOutcome::Next(Stage::Synthesize));
    }

    Ok(StageOutcome::Next(Stage::Act))
}

fn rag_result_json(docs: &[ScoredDoc]) -> String {
    let listed: Vec<_> = docs
        .iter()
        .map(|d| serde_json::json!({"doc_id": d.doc.doc_id, "text": d.doc.text, "score": d.score}))
        .collect();
    serde_json::json!({"count": docs.len(), "docs": listed}).to_string()
}

fn route_after_step(state: &ConversationState, collab: &Collaborators) -> Stage {
    if matches!(state.step_status, StepStatus::PlanDone | StepStatus::Fail) {
        return Stage::Synthesize;
    }
    if state.loop_count >= collab.config.orchestration.max_loops {
        return Stage::Synthesize;
    }
    Stage::Act
}

fn step_prompt(description: &str, capability: Capability) -> String {
    let guidance = match capability {
        Capability::RagRetrieve => {
            "must call rag_retrieve; if the result is empty or irrelevant, first call rag_rewrite_query then retry, up to 2 attempts"
        }
        Capability::RagRewriteQuery => "call rag_rewrite_query to produce a refined search query",
        Capability::DeleteFile => "this step deletes a file; confirm the path carefully before calling delete_file",
        Capability::AskUser => "this step cannot be completed automatically; ask the user for the missing information",
        Capability::None => "answer directly, no tool call is needed for this step",
        _ => "call the tool that matches this step's capability if one is needed",
    };
    format!("Current plan step: {description}\nGuidance: {guidance}")
}

/// The most recent `assistant` message carrying tool calls, plus the tool
/// messages that answered it — at most one such block (§4.8 Act step 2).
fn last_tool_call_block(messages: &[Message]) -> Option<Vec<Message>> {
    let idx = messages.iter().rposition(|m| m.role == Role::Assistant && m.has_tool_calls())?;
    let mut block = vec![messages[idx].clone()];
    for msg in &messages[idx + 1..] {
        if msg.role == Role::Tool {
            block.push(truncate_tool_message(msg));
        } else {
            break;
        }
    }
    Some(block)
}

fn last_tool_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.role == Role::Tool)
}

fn truncate_tool_message(msg: &Message) -> Message {
    let budget_chars = MAX_TOOL_RESULT_TOKENS * 4;
    if msg.content.chars().count() <= budget_chars {
        return msg.clone();
    }
    let margin = budget_chars / 20; // 5%
    let keep = budget_chars.saturating_sub(margin);
    let truncated: String = msg.content.chars().take(keep).collect();
    Message::tool_result(
        msg.tool_call_id.clone().unwrap_or_default(),
        msg.tool_name.clone().unwrap_or_default(),
        truncated,
    )
}

fn is_bad_tool_result(msg: &Message, capability: Capability) -> bool {
    let trimmed = msg.content.trim();
    if trimmed.is_empty() || trimmed == "{}" || trimmed == "[]" {
        return true;
    }
    let lower = trimmed.to_lowercase();
    if FAILURE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return true;
    }
    if capability.is_rag() {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if value.get("count").and_then(|v| v.as_u64()) == Some(0) {
                return true;
            }
        }
        if lower.contains("not found") {
            return true;
        }
    }
    false
}
