//! Thread identity: `user_id ⊕ thread_id` (§3, §4.3).
//!
//! The orchestration graph, the cancellation registry, and the checkpoint
//! store all key off the same `ThreadKey` so that "the same conversation"
//! means the same thing everywhere.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadKey {
    pub user_id: String,
    pub thread_id: String,
}

impl ThreadKey {
    pub fn new(user_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            thread_id: thread_id.into(),
        }
    }

    /// Stable string form, used as the checkpoint/profile filename stem and
    /// in trace events.
    pub fn as_canonical(&self) -> String {
        format!("{}:{}", self.user_id, self.thread_id)
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_canonical())
    }
}

/// Identifiers accepted from the RPC surface are restricted to
/// `[A-Za-z0-9_-]{1,64}` (§6) — this keeps them safe to use directly as path
/// segments under the persistence directory.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_joins_user_and_thread() {
        let key = ThreadKey::new("u1", "t1");
        assert_eq!(key.as_canonical(), "u1:t1");
        assert_eq!(key.to_string(), "u1:t1");
    }

    #[test]
    fn distinct_threads_for_same_user_are_distinct_keys() {
        let a = ThreadKey::new("u1", "t1");
        let b = ThreadKey::new("u1", "t2");
        assert_ne!(a, b);
    }

    #[test]
    fn valid_identifier_accepts_alnum_dash_underscore() {
        assert!(is_valid_identifier("user_1-ABC"));
    }

    #[test]
    fn valid_identifier_rejects_empty_and_oversized_and_slashes() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier(&"a".repeat(65)));
        assert!(!is_valid_identifier("../etc/passwd"));
    }
}
