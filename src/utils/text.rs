// src/utils/text.rs

//! Title and section normalisation.

use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static EDIT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\s*edit\s*\]").expect("valid regex"));

static FOOTNOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*(?:\d+|note \d+|citation needed)\s*\]").expect("valid regex")
});

static DISAMBIGUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*\((?:quest|mission|primary quest|campaign|prophecies|factions|nightfall|eye of the north|eotn|pre-searing)\)\s*$",
    )
    .expect("valid regex")
});

/// Shortest title kept after normalisation, in graphemes.
const MIN_TITLE_LEN: usize = 2;

/// Truncate to `max` graphemes, appending `...` when anything was cut.
pub fn truncate(text: &str, max: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

/// Strip control characters and wiki markup, then collapse whitespace.
fn clean(raw: &str) -> String {
    let text: String = raw
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let text = EDIT_MARKER.replace_all(&text, " ");
    let text = FOOTNOTE.replace_all(&text, " ");
    let text = text
        .replace("[[", "")
        .replace("]]", "")
        .replace("'''", "")
        .replace("''", "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Full canonical title, the input to key derivation.
///
/// Returns `None` when nothing usable remains.
pub fn canonical_title(raw: &str) -> Option<String> {
    let text = clean(raw);
    let text = DISAMBIGUATION.replace(&text, "");
    let text = text.trim();
    if text.graphemes(true).count() < MIN_TITLE_LEN {
        return None;
    }
    Some(text.to_string())
}

/// Normalise a section or region header.
pub fn normalize_section(raw: &str, max_len: usize) -> Option<String> {
    let text = clean(raw);
    let text = text.trim().trim_end_matches(':').trim();
    if text.is_empty() {
        return None;
    }
    Some(truncate(text, max_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_title_strips_markup() {
        assert_eq!(
            canonical_title("  The\tBlazefiend [edit] ").as_deref(),
            Some("The Blazefiend")
        );
        assert_eq!(
            canonical_title("'''Charr at the Gate'''[1]").as_deref(),
            Some("Charr at the Gate")
        );
    }

    #[test]
    fn test_canonical_title_drops_disambiguation() {
        assert_eq!(
            canonical_title("Across the Wall (quest)").as_deref(),
            Some("Across the Wall")
        );
        assert_eq!(
            canonical_title("The Great Northern Wall (mission)").as_deref(),
            Some("The Great Northern Wall")
        );
        // Only known suffixes are removed
        assert_eq!(
            canonical_title("Reach Level 10 (Charr at the Gate)").as_deref(),
            Some("Reach Level 10 (Charr at the Gate)")
        );
    }

    #[test]
    fn test_canonical_title_is_not_truncated() {
        let long = "The Very Long Quest Title That Goes On";
        assert_eq!(canonical_title(long).as_deref(), Some(long));
        assert_eq!(truncate(long, 8), "The Very...");
    }

    #[test]
    fn test_canonical_title_rejects_short() {
        assert_eq!(canonical_title("  "), None);
        assert_eq!(canonical_title("x"), None);
    }

    #[test]
    fn test_truncate_at_grapheme_boundary() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("e\u{301}e\u{301}e\u{301}", 2), "e\u{301}e\u{301}...");
    }

    #[test]
    fn test_normalize_section() {
        assert_eq!(
            normalize_section("Vanguard Outpost:[edit]", 64).as_deref(),
            Some("Vanguard Outpost")
        );
        assert_eq!(normalize_section(" : ", 64), None);
    }
}
