use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enable_global_limit: bool,
    pub enable_per_user_limit: bool,
    pub global_rate_per_sec: f64,
    pub global_burst: u64,
    pub per_user_rate_per_sec: f64,
    pub per_user_burst: u64,
    pub shard_count: usize,
    pub bucket_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enable_global_limit: true,
            enable_per_user_limit: true,
            global_rate_per_sec: 200.0,
            global_burst: 400,
            per_user_rate_per_sec: 5.0,
            per_user_burst: 10,
            shard_count: 64,
            bucket_ttl_secs: 600,
            cleanup_interval_secs: 60,
        }
    }
}
