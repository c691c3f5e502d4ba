//! Word lists driving keyword and topic extraction.
//!
//! A `Vocabulary` is passed explicitly into dedup and clustering so tests can
//! pin a small fixed list, and so a change to the lists is visible as a new
//! `version` rather than a silent shift in matching behaviour.

use std::collections::HashSet;

use serde::Deserialize;

pub const DEFAULT_VOCABULARY_VERSION: &str = "2024.1";

/// Tokens at or below this many characters are never keywords.
pub const DEFAULT_MIN_TOKEN_LEN: usize = 3;

/// Maximum keywords kept per title.
pub const DEFAULT_MAX_KEYWORDS: usize = 8;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "amid", "and", "any",
    "are", "around", "as", "at", "be", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "into", "is", "it", "its", "just", "last", "latest", "more", "most",
    "new", "news", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our",
    "out", "over", "said", "says", "same", "she", "should", "since", "some", "such", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "today", "under", "until", "upon", "very", "was", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
    "year", "years", "yesterday", "your", "week", "according", "report", "reports",
    "update", "live", "breaking", "video", "watch", "first", "still", "might",
];

/// Country, leader and organization names, in match priority order.
const GAZETTEER: &[&str] = &[
    // Organizations
    "united nations", "european union", "world bank", "federal reserve", "nato", "opec",
    "imf", "wto", "ecb", "brics", "asean", "african union",
    // Leaders
    "maduro", "milei", "lula", "petro", "boric", "sheinbaum", "trump", "biden", "putin",
    "zelensky", "xi jinping", "modi", "macron", "scholz", "sunak", "starmer", "meloni",
    "erdogan", "netanyahu", "khamenei", "kim jong un", "bukele", "noboa",
    // Countries and regions
    "venezuela", "argentina", "brazil", "colombia", "chile", "mexico", "peru", "ecuador",
    "bolivia", "uruguay", "paraguay", "cuba", "el salvador", "united states", "canada",
    "united kingdom", "france", "germany", "italy", "spain", "portugal", "ukraine",
    "russia", "china", "taiwan", "japan", "south korea", "north korea", "india",
    "pakistan", "iran", "israel", "gaza", "turkey", "saudi arabia", "egypt", "nigeria",
    "south africa", "kenya", "ethiopia", "australia", "indonesia", "philippines",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Vocabulary {
    pub version: String,
    pub stop_words: HashSet<String>,
    /// Lowercase entity names; earlier entries win when several match.
    pub gazetteer: Vec<String>,
    pub min_token_len: usize,
    pub max_keywords: usize,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            version: DEFAULT_VOCABULARY_VERSION.to_string(),
            stop_words: STOP_WORDS.iter().map(|s| s.to_string()).collect(),
            gazetteer: GAZETTEER.iter().map(|s| s.to_string()).collect(),
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            max_keywords: DEFAULT_MAX_KEYWORDS,
        }
    }
}

impl Vocabulary {
    /// Fixed vocabulary for tests and replays: given stop words and gazetteer,
    /// default token limits.
    pub fn fixed(version: &str, stop_words: &[&str], gazetteer: &[&str]) -> Self {
        Self {
            version: version.to_string(),
            stop_words: stop_words.iter().map(|s| s.to_lowercase()).collect(),
            gazetteer: gazetteer.iter().map(|s| s.to_lowercase()).collect(),
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            max_keywords: DEFAULT_MAX_KEYWORDS,
        }
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vocabulary_is_versioned() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.version, DEFAULT_VOCABULARY_VERSION);
        assert!(vocab.is_stop_word("the"));
        assert!(vocab.gazetteer.iter().any(|g| g == "venezuela"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let vocab: Vocabulary = toml::from_str(r#"version = "test-1""#).unwrap();
        assert_eq!(vocab.version, "test-1");
        assert_eq!(vocab.max_keywords, DEFAULT_MAX_KEYWORDS);
        assert!(vocab.is_stop_word("with"));
    }

    #[test]
    fn fixed_vocabulary_lowercases_entries() {
        let vocab = Vocabulary::fixed("t", &["The"], &["Venezuela"]);
        assert!(vocab.is_stop_word("the"));
        assert_eq!(vocab.gazetteer, vec!["venezuela".to_string()]);
    }
}
