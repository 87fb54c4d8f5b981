//! Shallow part-of-speech tagging.
//!
//! The normalizer only needs to tell proper nouns, common nouns, stop-words and
//! punctuation apart, so any implementation of [`Tagger`] with that capability will do.
//! [`RuleTagger`] is a dependency-light heuristic tagger good enough for product titles.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use stop_words::{get, LANGUAGE};

/// Coarse grammatical category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosClass {
    ProperNoun,
    CommonNoun,
    Other,
}

/// One tagged unit of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub pos: PosClass,
    pub is_stop: bool,
    pub is_punct: bool,
}

impl Token {
    /// Neither a stop-word nor punctuation.
    pub fn is_significant(&self) -> bool {
        !self.is_stop && !self.is_punct
    }
}

/// Anything that can split text into tagged tokens.
pub trait Tagger: Send + Sync {
    fn tag(&self, text: &str) -> Vec<Token>;
}

// NLTK's short English list (crate feature `nltk`). The ISO list also flags product
// words such as "tv", "fire" and "system".
static ENGLISH_STOPWORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    get(LANGUAGE::English)
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
});

// Suffixes that mark adjectives, adverbs and verb forms rather than nouns.
const MODIFIER_SUFFIXES: &[&str] = &["able", "ible", "ful", "less", "ous", "ive", "ing", "ed", "ly", "al"];

/// Heuristic tagger backed by the English stop-word list.
#[derive(Debug, Clone)]
pub struct RuleTagger {
    stopwords: HashSet<String>,
}

impl Default for RuleTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleTagger {
    pub fn new() -> Self {
        Self {
            stopwords: ENGLISH_STOPWORDS.clone(),
        }
    }

    /// Tagger with a custom stop-word list.
    pub fn with_stopwords(words: &[&str]) -> Self {
        Self {
            stopwords: words.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(&word.to_lowercase())
    }

    fn classify(word: &str) -> PosClass {
        let has_digit = word.chars().any(|c| c.is_ascii_digit());
        let has_alpha = word.chars().any(char::is_alphabetic);

        if has_digit && has_alpha {
            return PosClass::ProperNoun;
        }
        if !has_alpha {
            return PosClass::Other;
        }
        if word.chars().next().is_some_and(char::is_uppercase) {
            return PosClass::ProperNoun;
        }

        let lower = word.to_lowercase();
        let is_modifier = MODIFIER_SUFFIXES.iter().any(|suffix| {
            lower
                .strip_suffix(suffix)
                .is_some_and(|stem| stem.chars().count() >= 3)
        });
        if is_modifier {
            PosClass::Other
        } else {
            PosClass::CommonNoun
        }
    }

    fn word_token(&self, text: &str) -> Token {
        Token {
            text: text.to_string(),
            pos: Self::classify(text),
            is_stop: self.is_stopword(text),
            is_punct: false,
        }
    }

    fn punct_token(c: char) -> Token {
        Token {
            text: c.to_string(),
            pos: PosClass::Other,
            is_stop: false,
            is_punct: true,
        }
    }
}

impl Tagger for RuleTagger {
    fn tag(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();

        for chunk in text.split_whitespace() {
            let core = chunk.trim_matches(|c: char| !c.is_alphanumeric());
            if core.is_empty() {
                tokens.extend(chunk.chars().map(Self::punct_token));
                continue;
            }

            // `core` is a subslice of `chunk`, so the edges are plain byte ranges.
            let start = chunk.find(core).unwrap_or(0);
            let end = start + core.len();

            tokens.extend(chunk[..start].chars().map(Self::punct_token));
            tokens.push(self.word_token(core));
            tokens.extend(chunk[end..].chars().map(Self::punct_token));
        }

        tokens
    }
}
