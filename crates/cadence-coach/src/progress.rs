//! Inter-round progress messaging.
//!
//! One short phrase per round, chosen deterministically from the tool names
//! the model asked for.  Phrases stay in coaching language; no internal
//! terminology reaches the athlete.

/// Category precedence for phrase selection: the first matching category in
/// this order wins.
const CATEGORIES: [(&str, &str); 5] = [
    ("update-athlete-logbook", "Updating your training logbook..."),
    ("get-activity-streams", "Digging into your activity data..."),
    ("get-activity-details", "Taking a closer look at that session..."),
    ("get-recent-activities", "Reviewing your recent training..."),
    ("get-athlete-profile", "Pulling up your athlete profile..."),
];

/// Fallback phrases cycled by round index when no tool name matches a known
/// category.
const FALLBACKS: [&str; 3] = [
    "Thinking this through...",
    "Putting the pieces together...",
    "Almost there...",
];

/// Pick the progress phrase for a round.
///
/// Deterministic on the multiset of tool names: the highest-precedence
/// category present decides.  Unknown-only rounds fall back to a phrase
/// keyed off the round index.
pub fn progress_phrase(tool_names: &[&str], round: usize) -> &'static str {
    for (tool, phrase) in CATEGORIES {
        if tool_names.contains(&tool) {
            return phrase;
        }
    }
    FALLBACKS[round % FALLBACKS.len()]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logbook_outranks_everything() {
        let phrase = progress_phrase(
            &["get-athlete-profile", "update-athlete-logbook", "get-activity-streams"],
            0,
        );
        assert_eq!(phrase, "Updating your training logbook...");
    }

    #[test]
    fn streams_outrank_details_and_activities() {
        let phrase = progress_phrase(&["get-recent-activities", "get-activity-streams"], 0);
        assert_eq!(phrase, "Digging into your activity data...");
    }

    #[test]
    fn selection_ignores_call_order() {
        let a = progress_phrase(&["get-athlete-profile", "get-activity-details"], 2);
        let b = progress_phrase(&["get-activity-details", "get-athlete-profile"], 2);
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_tools_use_round_fallback() {
        assert_eq!(progress_phrase(&["mystery-tool"], 0), FALLBACKS[0]);
        assert_eq!(progress_phrase(&["mystery-tool"], 1), FALLBACKS[1]);
        assert_eq!(progress_phrase(&[], 4), FALLBACKS[1]);
    }

    #[test]
    fn phrases_free_of_internal_terms() {
        for (_, phrase) in CATEGORIES {
            for term in ["tool", "LLM", "API", "token", "stream_types"] {
                assert!(!phrase.contains(term), "phrase `{phrase}` leaks `{term}`");
            }
        }
    }
}
