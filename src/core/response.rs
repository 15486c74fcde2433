//! Discord text limits and UTF-8 safe truncation
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Generalize truncation over any limit, add embed title and field limits
//! - 1.0.0: Embed and message truncation

/// Discord embed description limit
pub const EMBED_LIMIT: usize = 4096;
/// Discord embed title limit
pub const EMBED_TITLE_LIMIT: usize = 256;
/// Discord embed field value limit
pub const EMBED_FIELD_LIMIT: usize = 1024;
/// Discord message content limit
pub const MESSAGE_LIMIT: usize = 2000;

/// Truncate text to `limit` bytes, adding an ellipsis if anything was cut
///
/// Never splits a multi-byte character.
pub fn truncate_to(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }

    // Room for "..."
    let mut end = limit.saturating_sub(3);
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Truncate text to fit embed limit, adding ellipsis if needed
pub fn truncate_for_embed(text: &str) -> String {
    truncate_to(text, EMBED_LIMIT)
}

pub fn truncate_for_title(text: &str) -> String {
    truncate_to(text, EMBED_TITLE_LIMIT)
}

/// Truncate text to fit message limit, adding ellipsis if needed
pub fn truncate_for_message(text: &str) -> String {
    truncate_to(text, MESSAGE_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_embed_short() {
        let text = "short text";
        assert_eq!(truncate_for_embed(text), text);
    }

    #[test]
    fn test_truncate_for_embed_long() {
        let text = "a".repeat(5000);
        let result = truncate_for_embed(&text);
        assert!(result.len() <= EMBED_LIMIT);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_truncate_title() {
        let result = truncate_for_title(&"t".repeat(300));
        assert_eq!(result.len(), EMBED_TITLE_LIMIT);
    }

    #[test]
    fn test_utf8_safety() {
        // 3-byte characters never line up with the cut point
        let text = "世界".repeat(100);
        let result = truncate_to(&text, 20);
        assert!(result.len() <= 20);
        assert!(result.ends_with("..."));
        assert!(result.trim_end_matches("...").chars().all(|c| c == '世' || c == '界'));
    }

    #[test]
    fn test_exactly_at_limit() {
        let text = "a".repeat(100);
        assert_eq!(truncate_to(&text, 100), text);
        assert_eq!(truncate_for_message(&text), text);
    }
}
