//! Plan stage (§4.8): produces an ordered list of `{description, capability}`
//! steps via a structured LLM call.

use agentd_domain::capability::Capability;
use agentd_domain::error::Result;
use agentd_domain::state::{ConversationState, PlanStep};
use agentd_providers::StructuredRequest;
use serde_json::json;

use super::{Collaborators, GraphContext, Stage, StageOutcome};

const MAX_PLAN_LEN: usize = 20;
const FALLBACK_DESCRIPTION: &str = "直接回答用户问题";

pub async fn run(state: &mut ConversationState, collab: &Collaborators, ctx: &GraphContext) -> Result<StageOutcome> {
    let _ = ctx;
    let schema = json!({
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "description": {"type": "string"},
                        "capability": {"type": "string"},
                    },
                    "required": ["description", "capability"],
                },
            },
        },
        "required": ["steps"],
    });
    let req = StructuredRequest {
        schema,
        default_on_failure: json!({"steps": []}),
        max_retries: collab.config.orchestration.max_structured_retries,
        label: "plan",
    };

    let result = collab.oracle.complete_structured(&state.messages, req).await?;
    state.usage.accumulate(result.usage);
    let steps = parse_plan(&result.value);

    state.plan = if steps.is_empty() || result.used_default {
        vec![fallback_step()]
    } else {
        steps
    };
    state.current_step_index = 0;

    Ok(StageOutcome::Next(Stage::Act))
}

fn fallback_step() -> PlanStep {
    PlanStep { description: FALLBACK_DESCRIPTION.to_string(), capability: Capability::None }
}

fn parse_plan(value: &serde_json::Value) -> Vec<PlanStep> {
    let raw_steps = match value.get("steps").and_then(|v| v.as_array()) {
        Some(arr) => arr,
        None => return Vec::new(),
    };

    let mut steps: Vec<PlanStep> = raw_steps
        .iter()
        .filter_map(|entry| {
            let description = entry.get("description")?.as_str()?.trim().to_string();
            if description.chars().filter(|c| !c.is_whitespace()).count() < 3 {
                return None;
            }
            let capability_tag = entry.get("capability").and_then(|v| v.as_str()).unwrap_or("ask_user");
            let capability = Capability::parse_or_ask_user(capability_tag);
            Some(PlanStep { description, capability })
        })
        .collect();

    if steps.is_empty() || steps.len() > MAX_PLAN_LEN {
        steps.truncate(MAX_PLAN_LEN);
    }
    steps
}
