mod auth;
mod llm;
mod orchestration;
mod persistence;
mod ratelimit;
mod retrieval;
mod server;
mod tools;

pub use auth::AuthConfig;
pub use llm::{LlmConfig, ModelOverride, ProviderAuthConfig};
pub use orchestration::OrchestrationConfig;
pub use persistence::PersistenceConfig;
pub use ratelimit::RateLimitConfig;
pub use retrieval::RetrievalConfig;
pub use server::{ServerConfig, TlsConfig};
pub use tools::ToolsConfig;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tls: TlsConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub orchestration: OrchestrationConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub persistence: PersistenceConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

/// A single `config validate` finding (§1a CLI section).
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            ConfigSeverity::Warning => "warning",
            ConfigSeverity::Error => "error",
        };
        write!(f, "{label}: {}", self.message)
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|e| crate::error::Error::Config(e.to_string()))
    }

    /// Sanity checks beyond what `serde`/`toml` enforce structurally. Does
    /// not touch the filesystem or environment — `doctor` layers that on top.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.tls.enabled && (self.tls.cert_path.is_none() || self.tls.key_path.is_none()) {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "tls.enabled is true but cert_path or key_path is unset".to_string(),
            });
        }
        if self.auth.enabled && self.auth.algorithm != "HS256" {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: format!("auth.algorithm {:?} is not supported (only HS256)", self.auth.algorithm),
            });
        }
        if self.rate_limit.global_burst == 0 && self.rate_limit.enable_global_limit {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "rate_limit.global_burst must be > 0 when enable_global_limit is set".to_string(),
            });
        }
        if self.orchestration.max_loops == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "orchestration.max_loops must be > 0".to_string(),
            });
        }
        if self.server.worker_pool_size == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "server.worker_pool_size is 0; synchronous tool work will contend with the async runtime".to_string(),
            });
        }
        if self.persistence.state_dir.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: "persistence.state_dir must not be empty".to_string(),
            });
        }

        issues
    }
}
