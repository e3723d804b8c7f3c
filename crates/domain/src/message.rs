//! The wire-agnostic conversation message shape (§3 of SPEC_FULL.md).
//!
//! A tagged variant `{system | user | assistant | tool}`. Insertion order
//! into a `ConversationState.messages` sequence is significant and is never
//! reordered by any stage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call emitted by the assistant, to be resolved by the Tools stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Stable once assigned; never reassigned across stages.
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Populated only for `role == Assistant`, and only when the model chose
    /// to call tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Populated only for `role == Tool`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        matches!(&self.tool_calls, Some(calls) if !calls.is_empty())
    }
}

/// `{input, output, total}`. Accumulation is field-wise addition; `total` is
/// always `input + output`, never a provider's cumulative counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl Usage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }

    pub fn accumulate(&mut self, other: Usage) {
        self.input += other.input;
        self.output += other.output;
        self.total += other.total;
    }
}

impl std::ops::Add for Usage {
    type Output = Usage;
    fn add(mut self, rhs: Usage) -> Usage {
        self.accumulate(rhs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_accumulate_is_field_wise() {
        let mut total = Usage::default();
        total.accumulate(Usage::new(10, 5));
        total.accumulate(Usage::new(3, 7));
        assert_eq!(total, Usage { input: 13, output: 12, total: 25 });
    }

    #[test]
    fn usage_total_is_never_providers_cumulative_counter() {
        // Constructing from (input, output) always derives total locally.
        let u = Usage::new(100, 50);
        assert_eq!(u.total, 150);
    }

    #[test]
    fn has_tool_calls_false_for_empty_vec() {
        let msg = Message::assistant_with_tool_calls("", vec![]);
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn has_tool_calls_true_when_populated() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![ToolCall { call_id: "c1".into(), name: "get_time".into(), args: serde_json::json!({}) }],
        );
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn tool_message_carries_call_id_and_name() {
        let msg = Message::tool_result("c1", "get_time", "12:00");
        assert_eq!(msg.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(msg.tool_name.as_deref(), Some("get_time"));
    }
}
