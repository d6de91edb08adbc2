//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This is close
//! enough for BPE tokenizers on English text and keeps budgeting cheap and
//! deterministic.

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Appended to content cut by [`truncate_to_tokens`].
pub const TRUNCATION_MARKER: &str = "\n[...truncated]";

/// Characters reserved for the marker when truncating.
const TRUNCATION_RESERVE: usize = 20;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Cut `text` down to roughly `max_tokens`.
///
/// Text already within budget is returned unchanged. Otherwise the first
/// `max_tokens * 4 - 20` characters are kept and the truncation marker is
/// appended. Applying it twice gives the same result as applying it once.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }
    let keep = max_tokens
        .saturating_mul(CHARS_PER_TOKEN)
        .saturating_sub(TRUNCATION_RESERVE);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 4 multi-byte characters
        assert_eq!(estimate_tokens("äöüß"), 1);
    }

    #[test]
    fn within_budget_is_unchanged() {
        let text = "a".repeat(40);
        assert_eq!(truncate_to_tokens(&text, 10), text);
    }

    #[test]
    fn over_budget_is_cut_with_marker() {
        let text = "b".repeat(1000);
        let cut = truncate_to_tokens(&text, 50);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(cut.chars().count(), 50 * 4 - 20 + TRUNCATION_MARKER.len());
        assert!(estimate_tokens(&cut) <= 50);
    }

    #[test]
    fn truncation_is_idempotent() {
        let samples = [
            String::new(),
            "short".to_string(),
            "x".repeat(83),
            "long line of text ".repeat(200),
            "ünïcödé ".repeat(64),
        ];
        for text in &samples {
            for budget in [0, 1, 3, 4, 5, 10, 21, 100] {
                let once = truncate_to_tokens(text, budget);
                let twice = truncate_to_tokens(&once, budget);
                assert_eq!(once, twice, "budget {budget} on {} chars", text.len());
            }
        }
    }

    #[test]
    fn tiny_budget_keeps_only_marker() {
        let cut = truncate_to_tokens("this will not fit at all", 2);
        assert_eq!(cut, TRUNCATION_MARKER);
    }

    #[test]
    fn huge_budget_does_not_overflow() {
        let text = "a".repeat(100);
        assert_eq!(truncate_to_tokens(&text, usize::MAX), text);
        assert_eq!(truncate_to_tokens(&text, usize::MAX / 2), text);
    }
}
