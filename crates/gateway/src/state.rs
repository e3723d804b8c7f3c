//! `AppState`: everything a single `AgentService` RPC call needs, assembled
//! once at startup by `bootstrap::build()` and shared via `Arc` across every
//! connection the server accepts.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use agentd_domain::config::Config;
use agentd_sessions::SessionRegistry;
use agentd_tools::approval::ApprovalStore;

use crate::auth::Authenticator;
use crate::graph::Collaborators;
use crate::ratelimit::RateLimiters;

pub struct AppState {
    pub collab: Collaborators,
    pub sessions: Arc<SessionRegistry>,
    pub checkpoints: Arc<agentd_sessions::CheckpointStore>,
    pub profiles: Arc<agentd_sessions::ProfileStore>,
    pub auth: Arc<Authenticator>,
    pub limiters: Arc<RateLimiters>,
    pub started_at: Instant,
    /// Wall-clock counterpart to `started_at`, carried solely for
    /// `GetServerInfo`'s `start_time` (a monotonic `Instant` cannot be
    /// rendered as a unix timestamp).
    pub started_wall: DateTime<Utc>,
}

impl AppState {
    pub fn config(&self) -> &Arc<Config> {
        &self.collab.config
    }

    pub fn approvals(&self) -> &Arc<ApprovalStore> {
        &self.collab.approvals
    }
}
