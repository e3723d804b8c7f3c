//! Uniform token-usage extraction (§4.7): reads `{input_tokens|prompt_tokens,
//! output_tokens|completion_tokens}` from any of three well-known response
//! shapes, zero-filling missing fields. The total is always derived locally
//! as `input + output`, never a provider's own cumulative counter.

use agentd_domain::message::Usage;
use serde_json::Value;

pub fn extract_usage(raw: &Value) -> Usage {
    let input = first_present(raw, &["input_tokens", "prompt_tokens"]);
    let output = first_present(raw, &["output_tokens", "completion_tokens"]);
    Usage::new(input, output)
}

fn first_present(raw: &Value, keys: &[&str]) -> u64 {
    for key in keys {
        if let Some(v) = raw.get(key).and_then(Value::as_u64) {
            return v;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_input_tokens_and_output_tokens_shape() {
        let raw = serde_json::json!({"input_tokens": 10, "output_tokens": 5});
        let usage = extract_usage(&raw);
        assert_eq!(usage, Usage::new(10, 5));
    }

    #[test]
    fn reads_prompt_tokens_and_completion_tokens_shape() {
        let raw = serde_json::json!({"prompt_tokens": 20, "completion_tokens": 8});
        let usage = extract_usage(&raw);
        assert_eq!(usage, Usage::new(20, 8));
    }

    #[test]
    fn missing_fields_zero_fill() {
        let raw = serde_json::json!({});
        assert_eq!(extract_usage(&raw), Usage::new(0, 0));
    }

    #[test]
    fn total_is_derived_not_read_from_a_cumulative_field() {
        let raw = serde_json::json!({"input_tokens": 10, "output_tokens": 5, "total_tokens": 999});
        let usage = extract_usage(&raw);
        assert_eq!(usage.total, 15);
    }

    #[test]
    fn input_tokens_key_takes_precedence_over_prompt_tokens() {
        let raw = serde_json::json!({"input_tokens": 1, "prompt_tokens": 999});
        assert_eq!(extract_usage(&raw).input, 1);
    }
}
