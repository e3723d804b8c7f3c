//! Profile-update stage (§4.8): the terminal stage on every path. Merges
//! new objective facts from the latest user turn into the stored bullet-list
//! profile, gated by a cheap keyword pre-check.

use agentd_domain::error::Result;
use agentd_domain::message::{Message, Role};
use agentd_domain::profile::normalize_empty;
use agentd_domain::state::ConversationState;
use agentd_sessions::ProfileEntry;

use super::{Collaborators, GraphContext, StageOutcome};

const PROFILE_SIGNAL_KEYWORDS: &[&str] = &["my name is", "i live", "i work", "i like", "i prefer", "i am", "i have"];
const FIRST_PERSON_MARKERS: &[&str] = &["i ", "i'm", "my ", "me "];

pub async fn run(state: &mut ConversationState, collab: &Collaborators, ctx: &GraphContext) -> Result<StageOutcome> {
    let latest_user = state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.to_lowercase())
        .unwrap_or_default();

    let has_signal = PROFILE_SIGNAL_KEYWORDS.iter().any(|kw| latest_user.contains(kw));
    let has_first_person = FIRST_PERSON_MARKERS.iter().any(|kw| latest_user.contains(kw));

    if has_signal && has_first_person {
        let existing = ctx
            .profiles
            .get("user_memory", &ctx.user_id, "profile")
            .ok()
            .flatten()
            .map(|e| e.memory)
            .unwrap_or_else(|| "[]".to_string());

        let prompt = vec![
            Message::system(
                "Merge new objective facts from the latest user message into the existing bullet-list profile. \
                 Never add subjective inferences. Respect explicit deletion ('forget X') and non-commitment \
                 ('I might ...') cues. Reply with the complete updated bullet list, or '[]' if empty.",
            ),
            Message::system(format!("Existing profile:\n{existing}")),
            Message::user(latest_user_original(state).unwrap_or_default()),
        ];

        let (reply, usage) = collab.oracle.complete(&prompt).await?;
        state.usage.accumulate(usage);

        let normalized = normalize_empty(&reply.content);
        if normalized.trim() != existing.trim() {
            let entry = ProfileEntry { memory: normalized };
            let _ = ctx.profiles.put("user_memory", &ctx.user_id, "profile", &entry);
        }
    }

    Ok(StageOutcome::Finished { reply: final_reply(state) })
}

fn latest_user_original(state: &ConversationState) -> Option<String> {
    state.messages.iter().rev().find(|m| m.role == Role::User).map(|m| m.content.clone())
}

fn final_reply(state: &ConversationState) -> String {
    state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests_support::{test_collaborators_with_replies, test_context};

    #[tokio::test]
    async fn no_signal_skips_the_update_call_and_finishes() {
        let collab = test_collaborators_with_replies(vec![Message::assistant("should not be called")]);
        let ctx = test_context("what time is it?");
        let mut state = ConversationState::default();
        state.messages.push(Message::user("what time is it?"));
        state.messages.push(Message::assistant("It's noon."));

        let outcome = run(&mut state, &collab, &ctx).await.unwrap();
        match outcome {
            StageOutcome::Finished { reply } => assert_eq!(reply, "It's noon."),
            _ => panic!("expected Finished"),
        }
        assert!(ctx.profiles.get("user_memory", &ctx.user_id, "profile").unwrap().is_none());
    }

    #[tokio::test]
    async fn first_person_signal_triggers_profile_write() {
        let collab = test_collaborators_with_replies(vec![Message::assistant("- likes rust")]);
        let ctx = test_context("I like rust programming");
        let mut state = ConversationState::default();
        state.messages.push(Message::user("I like rust programming"));
        state.messages.push(Message::assistant("Noted!"));

        run(&mut state, &collab, &ctx).await.unwrap();
        let stored = ctx.profiles.get("user_memory", &ctx.user_id, "profile").unwrap().unwrap();
        assert_eq!(stored.memory, "- likes rust");
    }

    #[tokio::test]
    async fn empty_sentinel_reply_is_normalized_before_write() {
        let collab = test_collaborators_with_replies(vec![Message::assistant("None")]);
        let ctx = test_context("I like rust programming");
        let mut state = ConversationState::default();
        state.messages.push(Message::user("I like rust programming"));
        state.messages.push(Message::assistant("Noted!"));

        run(&mut state, &collab, &ctx).await.unwrap();
        let stored = ctx.profiles.get("user_memory", &ctx.user_id, "profile").unwrap().unwrap();
        assert_eq!(stored.memory, "[]");
    }

    #[tokio::test]
    async fn sentinel_reply_against_already_normalized_profile_skips_the_write() {
        let collab = test_collaborators_with_replies(vec![Message::assistant("nothing")]);
        let ctx = test_context("I like rust programming");
        let entry = ProfileEntry { memory: "[]".to_string() };
        ctx.profiles.put("user_memory", &ctx.user_id, "profile", &entry).unwrap();

        let mut state = ConversationState::default();
        state.messages.push(Message::user("I like rust programming"));
        state.messages.push(Message::assistant("Noted!"));

        run(&mut state, &collab, &ctx).await.unwrap();
        let stored = ctx.profiles.get("user_memory", &ctx.user_id, "profile").unwrap().unwrap();
        assert_eq!(stored.memory, "[]");
    }

    #[tokio::test]
    async fn unchanged_profile_text_does_not_write() {
        let collab = test_collaborators_with_replies(vec![Message::assistant("[]")]);
        let ctx = test_context("I like rust programming");
        let entry = ProfileEntry { memory: "[]".to_string() };
        ctx.profiles.put("user_memory", &ctx.user_id, "profile", &entry).unwrap();

        let mut state = ConversationState::default();
        state.messages.push(Message::user("I like rust programming"));
        state.messages.push(Message::assistant("Noted!"));

        run(&mut state, &collab, &ctx).await.unwrap();
        // no panic / no error is the behavioral contract here; a byte-identical
        // rewrite is harmless either way.
        assert!(ctx.profiles.get("user_memory", &ctx.user_id, "profile").unwrap().is_some());
    }
}
