//! Keyword and topic extraction shared by dedup and clustering.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::vocabulary::Vocabulary;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid punctuation regex"));

/// Normalize a title for equality checks: lowercase and trim.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    PUNCTUATION
        .replace_all(&lowered, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Important keywords of a title: no stop-words, no short tokens, first
/// occurrence order, capped at `vocab.max_keywords`.
pub fn extract_keywords(text: &str, vocab: &Vocabulary) -> Vec<String> {
    let normalized = normalize_text(text);
    let mut seen = HashSet::new();
    normalized
        .split(' ')
        .filter(|token| token.chars().count() > vocab.min_token_len)
        .filter(|token| !vocab.is_stop_word(token))
        .filter(|token| seen.insert(*token))
        .take(vocab.max_keywords)
        .map(str::to_string)
        .collect()
}

/// Best-effort named entity for a title: first gazetteer entry found as a
/// whole phrase, else the first keyword.
pub fn main_topic(text: &str, vocab: &Vocabulary) -> Option<String> {
    let padded = format!(" {} ", normalize_text(text));
    vocab
        .gazetteer
        .iter()
        .find(|entry| !entry.is_empty() && padded.contains(&format!(" {entry} ")))
        .cloned()
        .or_else(|| extract_keywords(text, vocab).into_iter().next())
}

/// Jaccard similarity of two keyword lists treated as sets. Empty vs empty is 0.
pub fn jaccard<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    let a: HashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let b: HashSet<&str> = b.iter().map(AsRef::as_ref).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a char.
pub fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let end = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_bytes)
        .last()
        .unwrap_or(0);
    &s[..end]
}
