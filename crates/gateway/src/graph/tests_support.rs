//! Shared test fixtures for the graph stage unit tests.

use std::sync::Arc;
use std::time::Duration;

use agentd_domain::config::Config;
use agentd_providers::stub::{FixedRetriever, ScriptedOracle};
use agentd_sessions::{CancelHandle, CheckpointStore, ProfileStore};
use agentd_tools::approval::ApprovalStore;
use agentd_tools::ToolRegistry;

use super::{Collaborators, GraphContext};

/// A `Collaborators` bundle wired to deterministic stubs: one scripted
/// assistant reply, an empty retriever corpus, no blacklisted tools.
pub(crate) fn test_collaborators() -> Collaborators {
    test_collaborators_with_replies(vec![agentd_domain::message::Message::assistant("I am the assistant.")])
}

pub(crate) fn test_collaborators_with_replies(replies: Vec<agentd_domain::message::Message>) -> Collaborators {
    Collaborators {
        oracle: Arc::new(ScriptedOracle::new(replies)),
        retriever: Arc::new(FixedRetriever::empty()),
        tools: Arc::new(ToolRegistry::new(Vec::<String>::new())),
        approvals: Arc::new(ApprovalStore::new(Duration::from_secs(300))),
        config: Arc::new(Config::default()),
    }
}

pub(crate) fn test_context(user_input: &str) -> GraphContext {
    let checkpoint_dir = tempfile::tempdir().unwrap().keep();
    let profile_dir = tempfile::tempdir().unwrap().keep();
    let checkpoints = CheckpointStore::new(checkpoint_dir);
    checkpoints.setup().unwrap();
    let profiles = ProfileStore::new(profile_dir);
    profiles.setup().unwrap();

    GraphContext {
        user_id: "u1".to_string(),
        thread_id: "t1".to_string(),
        cancel: CancelHandle::new(),
        checkpoints: Arc::new(checkpoints),
        profiles: Arc::new(profiles),
        user_input: Some(user_input.to_string()),
        resume: None,
    }
}
