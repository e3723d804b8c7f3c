use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Credential resolution precedence (§7 ambient expansion): plaintext `key` >
/// OS keychain (`service`+`account`) > env var > keychain headless fallback
/// (`{SERVICE}_{ACCOUNT}` uppercased) > error. Resolution itself lives in
/// `agentd-providers::credential` since it's the provider crate that needs a
/// live key; this struct only carries the TOML-facing shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderAuthConfig {
    pub key: Option<String>,
    pub service: Option<String>,
    pub account: Option<String>,
    pub env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOverride {
    pub input_token_budget: u64,
    pub timeout_secs: u64,
}

impl Default for ModelOverride {
    fn default() -> Self {
        Self {
            input_token_budget: 128_000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub default_model: String,
    /// OpenAI-compatible chat-completions base URL (no trailing slash).
    pub base_url: String,
    pub auth: ProviderAuthConfig,
    pub input_token_budget: u64,
    pub timeout_secs: u64,
    pub model_overrides: HashMap<String, ModelOverride>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_model: "default".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            auth: ProviderAuthConfig::default(),
            input_token_budget: 128_000,
            timeout_secs: 60,
            model_overrides: HashMap::new(),
        }
    }
}

impl LlmConfig {
    pub fn budget_for(&self, model: &str) -> u64 {
        self.model_overrides
            .get(model)
            .map(|o| o.input_token_budget)
            .unwrap_or(self.input_token_budget)
    }

    pub fn timeout_for(&self, model: &str) -> u64 {
        self.model_overrides
            .get(model)
            .map(|o| o.timeout_secs)
            .unwrap_or(self.timeout_secs)
    }
}
