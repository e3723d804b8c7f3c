//! Tool Registry (§4.5): a name → tool map with a blacklist, used by the
//! Act/Tools stages of the orchestration graph.

pub mod approval;
pub mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

/// Marker appended to a tool result that was cut to `max_bytes` (§4.5).
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn arg_schema(&self) -> Value;
    async fn run(&self, args: Value) -> Result<Value, String>;
}

#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    blacklist: RwLock<std::collections::HashSet<String>>,
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}

impl ToolRegistry {
    pub fn new(blacklist: impl IntoIterator<Item = String>) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            blacklist: RwLock::new(blacklist.into_iter().collect()),
        }
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.write().insert(tool.name().to_string(), tool);
    }

    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.read().contains(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    /// Run a tool and serialize its result to text, truncating to
    /// `max_output_bytes` with an explicit marker if it exceeds that bound.
    pub async fn invoke(&self, name: &str, args: Value, max_output_bytes: usize) -> Result<String, String> {
        let tool = self.get(name).ok_or_else(|| format!("unknown tool '{name}'"))?;
        let result = tool.run(args).await?;
        let mut text = serde_json::to_string(&result).map_err(|e| e.to_string())?;
        if text.len() > max_output_bytes {
            let cut = max_output_bytes.saturating_sub(TRUNCATION_MARKER.len());
            let boundary = floor_char_boundary(&text, cut);
            text.truncate(boundary);
            text.push_str(TRUNCATION_MARKER);
        }
        Ok(text)
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn arg_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn run(&self, args: Value) -> Result<Value, String> {
            Ok(args)
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn arg_schema(&self) -> Value {
            serde_json::json!({})
        }
        async fn run(&self, _args: Value) -> Result<Value, String> {
            Err("boom".to_string())
        }
    }

    #[tokio::test]
    async fn invoke_unknown_tool_is_an_error() {
        let registry = ToolRegistry::new(std::iter::empty());
        let err = registry.invoke("nonexistent", serde_json::json!({}), 1024).await.unwrap_err();
        assert!(err.contains("unknown tool"));
    }

    #[tokio::test]
    async fn invoke_runs_registered_tool() {
        let registry = ToolRegistry::new(std::iter::empty());
        registry.register(Arc::new(EchoTool));
        let out = registry.invoke("echo", serde_json::json!({"x": 1}), 1024).await.unwrap();
        assert_eq!(out, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn invoke_propagates_tool_error() {
        let registry = ToolRegistry::new(std::iter::empty());
        registry.register(Arc::new(FailingTool));
        let err = registry.invoke("fail", serde_json::json!({}), 1024).await.unwrap_err();
        assert_eq!(err, "boom");
    }

    #[tokio::test]
    async fn invoke_truncates_output_exceeding_max_bytes() {
        let registry = ToolRegistry::new(std::iter::empty());
        registry.register(Arc::new(EchoTool));
        let big = serde_json::json!({"data": "x".repeat(1000)});
        let out = registry.invoke("echo", big, 100).await.unwrap();
        assert!(out.len() <= 100);
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn blacklist_membership_is_queryable() {
        let registry = ToolRegistry::new(["delete_file".to_string(), "code_exec".to_string()]);
        assert!(registry.is_blacklisted("delete_file"));
        assert!(!registry.is_blacklisted("file_read"));
    }
}
