//! Noise vocabulary for marketplace titles.
//!
//! The pattern table is applied destructively to a lower-cased working copy of a title.
//! The same source texts double as a word filter during candidate extraction: a token is
//! rejected when it appears as a whole word inside any pattern's source text, whether or
//! not that pattern fired on the current title.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Ordered noise patterns. Every pattern is applied once, left to right.
pub const NOISE_PATTERNS: &[&str] = &[
    r"\bnewest\b", r"\bversion\b", r"\bmodel\b", r"\bseries\b",
    r"\bpack of \d+\b", r"\bset of \d+\b", r"\b(pk|count) of \d+\b",
    r"\bunlocked\b", r"\bunlocked smartphone\b", r"\bofficial\b",
    r"\b(us|international) version\b", r"\b(20\d{2})\b",
    r"\bfor \w+\s?\w*\b",
    r"\bcompatible with\b", r"\bcase for\b", r"\bprotector\b",
    r"\bscreen\b", r"\bcharger\b", r"\bcable\b", r"\badapter\b",
    r"\b(mount|stand)\b", r"\bhousing\b", r"\baccessory\b",
    // colors
    r"\b(black|white|blue|red|green|silver|gold|grey|pink|purple|phantom|titanium|starlight|midnight|graphite|alpine|sierra|rose|platinum)\b",
    r"\d{2,3}(?:gb|tb|mb)\b",
    r"\b(gb|tb|mb)\b",
    r"\b(pc|pcs)\b",
    r"\bphone\b", r"\bsmartphone\b", r"\bdevice\b", r"\btablet\b",
    r"\boverview\b", r"\bfeatures\b", r"\b(high|premium) quality\b",
    r"\b(original|authentic)\b", r"\b(replacement|spare)\b",
    r"\bkit\b", r"\btool\b", r"\bsupplies\b", r"\bparts?\b",
    r"\bcombo\b", r"\bdeal\b", r"\bbundle\b",
    // resolutions
    r"\b(hd|fhd|uhd|4k|8k)\b",
    // connectivity
    r"\bwireless\b", r"\bwired\b", r"\bbluetooth\b", r"\bwi-fi\b", r"\b(gps|cellular)\b",
    // materials
    r"\baluminum\b", r"\bsilicone\b", r"\btpu\b", r"\bglass\b", r"\bleather\b",
    r"\bcamera\b", r"\b(front|rear)\b", r"\bdual camera\b",
    r"\bdisplay\b", r"\b(lcd|oled|amoled)\b", r"\btouchscreen\b",
    r"\bslim\b", r"\bdurable\b", r"\bheavy duty\b", r"\bwaterproof\b",
    r"\bnew\b", r"\bquick charge\b", r"\bfast charge\b", r"\bwall charger\b",
    r"\bgen\s?\d+\b",
    r"\bstorage\b", r"\bmemory\b",
    r"\b(car|auto|vehicle)\b",
    r"\b(universal|multi-purpose)\b",
    r"\boverall\b", r"\bperformance\b", r"\bdesign\b",
    r"\bstyle\b", r"\bcolor\b", r"\bmaterial\b",
    r"\b(fast|quick)\b", r"\b(super|ultra)\b",
];

static COMPILED: Lazy<Vec<Regex>> = Lazy::new(|| {
    NOISE_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
        .collect()
});

/// Whole-token variants of the table, used to decide whether one word is itself noise.
static ANCHORED: Lazy<Vec<Regex>> = Lazy::new(|| {
    NOISE_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i)^(?:{})$", p)).ok())
        .collect()
});

/// Maximal word-character runs of every pattern source, e.g. `black` and `bnewest`.
static SOURCE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    NOISE_PATTERNS
        .iter()
        .copied()
        .flat_map(|source| source.split(|c: char| !is_word_char(c)))
        .filter(|run| !run.is_empty())
        .collect()
});

static PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").unwrap());
static BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Result of running the noise table over a title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stripped {
    /// Cleaned text with whitespace collapsed and trimmed.
    pub text: String,
    /// Lower-cased words that were part of a span some pattern actually removed.
    pub removed: Vec<String>,
}

impl Stripped {
    pub fn was_removed(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.removed.iter().any(|r| *r == word)
    }
}

/// Drops every parenthesized and bracketed span.
pub fn strip_brackets(text: &str) -> String {
    let text = PARENS.replace_all(text, "");
    BRACKETS.replace_all(&text, "").into_owned()
}

/// Applies every noise pattern in order, then collapses whitespace.
pub fn strip_noise(text: &str) -> Stripped {
    let mut working = text.to_string();
    let mut removed = Vec::new();

    for pattern in COMPILED.iter() {
        if !pattern.is_match(&working) {
            continue;
        }
        for m in pattern.find_iter(&working) {
            removed.extend(m.as_str().split_whitespace().map(str::to_lowercase));
        }
        working = pattern.replace_all(&working, "").into_owned();
    }

    let text = WHITESPACE.replace_all(&working, " ").trim().to_string();
    Stripped { text, removed }
}

/// True when some pattern matches the whole word on its own.
///
/// Surrounding punctuation is ignored, so `(Black)` counts as noise.
pub fn is_noise_word(word: &str) -> bool {
    let word = word.trim_matches(|c: char| !c.is_alphanumeric());
    if word.is_empty() {
        return false;
    }
    ANCHORED.iter().any(|p| p.is_match(word))
}

/// True when `token` occurs as a whole word inside the source text of any pattern.
///
/// This is a literal check against the pattern sources, e.g. `black` (inside the color
/// alternation) or `with` (inside `compatible with`). Matching is case-sensitive.
pub fn in_pattern_source(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    if token.chars().all(is_word_char) {
        return SOURCE_WORDS.contains(token);
    }
    NOISE_PATTERNS.iter().any(|source| contains_bounded(source, token))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// `needle` occurs in `haystack` with no word character directly on either side.
fn contains_bounded(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, m)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + m.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}
