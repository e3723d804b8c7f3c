//! Human-in-the-loop approval for blacklisted tool calls (§4.5).
//!
//! When a stage step emits calls that include any blacklisted tool, the
//! stage suspends and records a `PendingApproval` here; the RPC layer
//! surfaces it to the caller as an interrupt and later resolves it with
//! `{answer: "y"|"n", reason?}`.

use std::collections::HashMap;
use std::time::Duration;

use agentd_domain::message::ToolCall;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug)]
pub enum ApprovalDecision {
    Approved,
    Denied { reason: Option<String> },
}

impl ApprovalDecision {
    pub fn from_answer(answer: &str, reason: Option<String>) -> Self {
        match answer {
            "y" => ApprovalDecision::Approved,
            _ => ApprovalDecision::Denied { reason },
        }
    }
}

pub struct PendingApproval {
    pub id: Uuid,
    pub thread_key: String,
    pub blacklisted_calls: Vec<ToolCall>,
    pub created_at: DateTime<Utc>,
    pub respond: oneshot::Sender<ApprovalDecision>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalInfo {
    pub id: Uuid,
    pub thread_key: String,
    pub tool_names: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&PendingApproval> for ApprovalInfo {
    fn from(p: &PendingApproval) -> Self {
        Self {
            id: p.id,
            thread_key: p.thread_key.clone(),
            tool_names: p.blacklisted_calls.iter().map(|c| c.name.clone()).collect(),
            created_at: p.created_at,
        }
    }
}

pub struct ApprovalStore {
    pending: RwLock<HashMap<Uuid, PendingApproval>>,
    timeout: Duration,
}

impl ApprovalStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn insert(&self, approval: PendingApproval) -> ApprovalInfo {
        let info = ApprovalInfo::from(&approval);
        self.pending.write().insert(approval.id, approval);
        info
    }

    pub fn resolve(&self, id: &Uuid, answer: &str, reason: Option<String>) -> bool {
        if let Some(pending) = self.pending.write().remove(id) {
            let _ = pending.respond.send(ApprovalDecision::from_answer(answer, reason));
            return true;
        }
        false
    }

    pub fn remove_expired(&self, id: &Uuid) {
        self.pending.write().remove(id);
    }

    pub fn list_pending(&self) -> Vec<ApprovalInfo> {
        self.pending.read().values().map(ApprovalInfo::from).collect()
    }
}
