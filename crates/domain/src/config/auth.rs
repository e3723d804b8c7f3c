use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// Resolved from `AGENTD_JWT_SECRET` at startup; never stored in a config
    /// file on disk. `None` here means "read from env".
    #[serde(skip)]
    pub jwt_secret_env: String,
    pub algorithm: String,
    pub skip_methods: Vec<String>,
    pub token_cache_ttl_secs: u64,
    pub token_cache_capacity: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jwt_secret_env: "AGENTD_JWT_SECRET".to_string(),
            algorithm: "HS256".to_string(),
            // §4.9: GetServerInfo is unconditionally exempt from auth and
            // rate-limiting, not merely by convention.
            skip_methods: vec![
                "grpc.health.v1.Health/Check".to_string(),
                "agentd.agent.v1.AgentService/GetServerInfo".to_string(),
            ],
            token_cache_ttl_secs: 60,
            token_cache_capacity: 10_000,
        }
    }
}
