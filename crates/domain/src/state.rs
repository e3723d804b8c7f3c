//! `ConversationState` — the unit of checkpointing (§3, §4.4).
//!
//! Mutated only by the orchestration graph running one request at a time for
//! a given thread; fully serializable at every stage boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::message::{Message, Usage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Continue,
    StepDone,
    PlanDone,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub description: String,
    pub capability: Capability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub usage: Usage,
    /// Recognized keys: `current_user_question`, `summary`, `user_profile_cache`.
    #[serde(default)]
    pub context: HashMap<String, String>,
    /// Bounded sliding window of user/assistant messages, length <= `w_recent`.
    #[serde(default)]
    pub recent_pairs: Vec<Message>,
    pub plan: Vec<PlanStep>,
    #[serde(default)]
    pub current_step_index: usize,
    #[serde(default)]
    pub tool_attempts: u32,
    #[serde(default)]
    pub loop_count: u32,
    #[serde(default = "default_step_status")]
    pub step_status: StepStatus,
    #[serde(default)]
    pub requires_agent: bool,
}

fn default_step_status() -> StepStatus {
    StepStatus::Continue
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            usage: Usage::default(),
            context: HashMap::new(),
            recent_pairs: Vec::new(),
            plan: Vec::new(),
            current_step_index: 0,
            tool_attempts: 0,
            loop_count: 0,
            step_status: StepStatus::Continue,
            requires_agent: false,
        }
    }
}

/// An invariant violation, used only in debug assertions and tests — a
/// production stage must never let one of these occur, so a caught
/// violation indicates a programming error, not a runtime condition to
/// recover from at the RPC boundary.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("plan_steps length {steps} != plan_capabilities length {caps}")]
    PlanLengthMismatch { steps: usize, caps: usize },
    #[error("current_step_index {index} out of bounds for plan of length {len}")]
    StepIndexOutOfBounds { index: usize, len: usize },
    #[error("loop_count {loop_count} exceeds max_loops {max_loops}")]
    LoopCountExceeded { loop_count: u32, max_loops: u32 },
    #[error("tool_attempts {attempts} exceeds max_tool_attempts {max}")]
    ToolAttemptsExceeded { attempts: u32, max: u32 },
}

impl ConversationState {
    /// Reset per-request scratch fields. Called at the top of the Summarize
    /// stage for every new traversal (§4.8 Summarize).
    pub fn reset_for_new_request(&mut self) {
        self.plan.clear();
        self.current_step_index = 0;
        self.tool_attempts = 0;
        self.loop_count = 0;
        self.step_status = StepStatus::Continue;
    }

    pub fn current_step(&self) -> Option<&PlanStep> {
        self.plan.get(self.current_step_index)
    }

    pub fn last_assistant_tool_calls(&self) -> Option<&[crate::message::ToolCall]> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::Assistant)
            .and_then(|m| m.tool_calls.as_deref())
    }

    /// Check all invariants that must hold after a stage boundary (§3).
    /// Called in tests and in debug builds after every stage transition.
    pub fn check_invariants(&self, max_loops: u32, max_tool_attempts: u32) -> Result<(), InvariantViolation> {
        if self.current_step_index > self.plan.len() {
            return Err(InvariantViolation::StepIndexOutOfBounds {
                index: self.current_step_index,
                len: self.plan.len(),
            });
        }
        if self.loop_count > max_loops {
            return Err(InvariantViolation::LoopCountExceeded {
                loop_count: self.loop_count,
                max_loops,
            });
        }
        if self.tool_attempts > max_tool_attempts {
            return Err(InvariantViolation::ToolAttemptsExceeded {
                attempts: self.tool_attempts,
                max: max_tool_attempts,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_passes_invariants() {
        let state = ConversationState::default();
        assert!(state.check_invariants(10, 2).is_ok());
    }

    #[test]
    fn reset_clears_scratch_fields_but_not_messages() {
        let mut state = ConversationState::default();
        state.messages.push(Message::user("hi"));
        state.plan.push(PlanStep { description: "x".into(), capability: Capability::None });
        state.current_step_index = 1;
        state.tool_attempts = 2;
        state.loop_count = 5;
        state.step_status = StepStatus::Fail;

        state.reset_for_new_request();

        assert!(state.plan.is_empty());
        assert_eq!(state.current_step_index, 0);
        assert_eq!(state.tool_attempts, 0);
        assert_eq!(state.loop_count, 0);
        assert_eq!(state.step_status, StepStatus::Continue);
        assert_eq!(state.messages.len(), 1, "messages are not scratch fields");
    }

    #[test]
    fn loop_count_exceeding_max_is_a_violation() {
        let mut state = ConversationState::default();
        state.loop_count = 11;
        assert_eq!(
            state.check_invariants(10, 2),
            Err(InvariantViolation::LoopCountExceeded { loop_count: 11, max_loops: 10 })
        );
    }

    #[test]
    fn step_index_past_plan_end_is_a_violation() {
        let mut state = ConversationState::default();
        state.plan.push(PlanStep { description: "only step".into(), capability: Capability::None });
        state.current_step_index = 2;
        assert_eq!(
            state.check_invariants(10, 2),
            Err(InvariantViolation::StepIndexOutOfBounds { index: 2, len: 1 })
        );
    }

    #[test]
    fn checkpoint_round_trip_preserves_state() {
        let mut state = ConversationState::default();
        state.messages.push(Message::user("hello"));
        state.messages.push(Message::assistant("hi there"));
        state.usage.accumulate(Usage::new(10, 5));
        state.plan.push(PlanStep { description: "step one".into(), capability: Capability::GetTime });

        let json = serde_json::to_string(&state).unwrap();
        let restored: ConversationState = serde_json::from_str(&json).unwrap();
        let json2 = serde_json::to_string(&restored).unwrap();
        assert_eq!(json, json2);
    }
}
