//! Tokenization helpers shared by the keyword engine and the brain.

use std::sync::LazyLock;

use regex::Regex;

/// Words that never anchor a search phrase.
const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been", "but", "by",
    "can", "each", "every", "for", "from", "has", "have", "her", "his", "how", "if", "in", "into",
    "is", "it", "its", "just", "like", "made", "more", "most", "my", "new", "no", "not", "of",
    "on", "one", "or", "our", "out", "so", "some", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "to", "too", "up", "us", "very", "was",
    "we", "were", "what", "when", "which", "while", "who", "will", "with", "you", "your",
];

/// Lowercase words of at least two characters (or any digit run).
pub(crate) fn words(text: &str) -> Vec<String> {
    static WORD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("valid regex"));

    let lower = text.to_lowercase().replace('\'', "");
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| w.len() > 1 || w.chars().all(|c| c.is_ascii_digit()))
        .map(String::from)
        .collect()
}

pub(crate) fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// [`words`] minus stop words.
pub(crate) fn content_words(text: &str) -> Vec<String> {
    words(text).into_iter().filter(|w| !is_stop_word(w)).collect()
}

/// Canonical form of a phrase: lowercase words joined by single spaces.
pub(crate) fn normalize_phrase(text: &str) -> String {
    words(text).join(" ")
}

/// Split free text into sentence-like chunks.
pub(crate) fn sentences(text: &str) -> Vec<&str> {
    static SENTENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[.!?;:\n]+").expect("valid regex"));

    SENTENCE_RE
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Uppercase the first letter of every word.
pub(crate) fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uppercase only the first letter of the text.
pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate to at most `max` characters, preferring a word boundary.
pub(crate) fn truncate_at_word(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let cut: String = text.chars().take(max).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    trimmed
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '-' | '|' | '/' | '&'))
        .to_string()
}

/// Round to two decimals for stable JSON output.
pub(crate) fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_words_are_sorted_for_binary_search() {
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOP_WORDS);
    }

    #[test]
    fn words_lowercase_and_drop_noise() {
        assert_eq!(
            words("Mom's Handmade MUG, 12 oz & a"),
            vec!["moms", "handmade", "mug", "12", "oz"]
        );
    }

    #[test]
    fn content_words_skip_stop_words() {
        assert_eq!(
            content_words("The perfect gift for your mom"),
            vec!["perfect", "gift", "mom"]
        );
    }

    #[test]
    fn sentence_split() {
        let parts = sentences("Glazed by hand. Dishwasher safe!\nHolds 12 oz");
        assert_eq!(parts, vec!["Glazed by hand", "Dishwasher safe", "Holds 12 oz"]);
    }

    #[test]
    fn truncate_prefers_word_boundary() {
        assert_eq!(truncate_at_word("Ceramic Coffee Mug | Gift", 16), "Ceramic Coffee");
        assert_eq!(truncate_at_word("short", 20), "short");
        assert_eq!(truncate_at_word("abcdefghij", 4), "abcd");
    }

    #[test]
    fn casing_helpers() {
        assert_eq!(title_case("ceramic coffee mug"), "Ceramic Coffee Mug");
        assert_eq!(capitalize("ceramic mug"), "Ceramic mug");
    }
}
