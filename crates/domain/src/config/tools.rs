use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub workspace_root: String,
    pub blacklist: HashSet<String>,
    pub exec_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace_root: "./workspace".to_string(),
            blacklist: ["delete_file", "code_exec"].into_iter().map(String::from).collect(),
            exec_timeout_secs: 15,
        }
    }
}

impl ToolsConfig {
    pub fn is_blacklisted(&self, tool_name: &str) -> bool {
        self.blacklist.contains(tool_name)
    }
}
