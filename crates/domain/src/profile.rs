//! Persisted user-profile text (§4.4 profile store).
//!
//! Stored as an opaque bullet-list string, never parsed into structured
//! fields — the Profile Update stage produces it, the Summarize stage
//! injects it verbatim into context.

/// Sentinel values a model may emit to mean "no facts known". The
/// persistence layer normalizes every one of these to the literal `"[]"`
/// before writing, so downstream prompt construction never has to special
/// case an empty-but-truthy string.
const EMPTY_SENTINELS: &[&str] = &["空", "None", "null", "", "nothing"];

pub fn normalize_empty(profile: &str) -> String {
    let trimmed = profile.trim();
    if EMPTY_SENTINELS.contains(&trimmed) {
        "[]".to_string()
    } else {
        profile.to_string()
    }
}

pub fn is_empty_profile(profile: &str) -> bool {
    profile.trim() == "[]"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sentinels_normalize_to_empty_bracket() {
        for s in EMPTY_SENTINELS {
            assert_eq!(normalize_empty(s), "[]");
        }
    }

    #[test]
    fn whitespace_padded_sentinel_still_normalizes() {
        assert_eq!(normalize_empty("  None  "), "[]");
    }

    #[test]
    fn non_empty_profile_passes_through_unchanged() {
        let profile = "- likes concise answers\n- prefers Rust examples";
        assert_eq!(normalize_empty(profile), profile);
    }

    #[test]
    fn is_empty_profile_detects_normalized_form() {
        assert!(is_empty_profile("[]"));
        assert!(!is_empty_profile("- has a dog"));
    }
}
