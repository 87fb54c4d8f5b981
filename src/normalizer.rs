//! Product title normalization.
//!
//! Turns a noisy marketplace title such as
//! `"Apple Watch Series 8 GPS 41mm (Midnight)"` into a short label (`"Apple Watch 8 41mm"`)
//! that works as a search term against social media.
//!
//! Two pipelines run side by side:
//! - brand detection reads the leading title-cased words of the original title;
//! - candidate extraction tags a lower-cased, noise-stripped copy and keeps model
//!   numbers, proper nouns, acronyms and, failing those, common nouns.
//!
//! The function never fails: degenerate input falls back to the first significant words
//! of the original title, then to a raw truncation of it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::noise::{self, Stripped};
use crate::tagger::{PosClass, Tagger, Token};

/// Maximum length of a normalized label before the ellipsis.
pub const MAX_TITLE_LEN: usize = 70;
/// Number of significant words kept by the word fallback.
pub const FALLBACK_TERMS: usize = 5;
/// Length of the raw fallback slice.
pub const FALLBACK_RAW_LEN: usize = 50;

const ELLIPSIS: &str = "...";
const MAX_BRAND_WORDS: usize = 3;

// e.g. "M1", "S22", "iPhone13", "735"
static MODEL_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z]{1,3})?\d+[A-Za-z0-9-]*$|^[A-Za-z]{2,}[0-9]+[A-Za-z]*$").unwrap()
});

/// How candidate tokens are checked against the noise vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseFilter {
    /// Reject a token whose text appears as a word inside any pattern's source text.
    #[default]
    PatternSource,
    /// Reject a token only if a pattern actually removed it from this title.
    StrippedSpans,
}

impl NoiseFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pattern-source" | "pattern_source" | "loose" => Some(Self::PatternSource),
            "stripped-spans" | "stripped_spans" | "strict" => Some(Self::StrippedSpans),
            _ => None,
        }
    }

    fn rejects(&self, token: &str, stripped: &Stripped) -> bool {
        match self {
            NoiseFilter::PatternSource => noise::in_pattern_source(token),
            NoiseFilter::StrippedSpans => stripped.was_removed(token),
        }
    }
}

/// Ordered, case-insensitively unique list of terms.
#[derive(Debug, Default)]
struct TermSet {
    terms: Vec<String>,
    seen_lower: HashSet<String>,
}

impl TermSet {
    fn contains(&self, term: &str) -> bool {
        self.seen_lower.contains(&term.to_lowercase())
    }

    /// Adds the brand and marks each of its words as seen.
    fn push_brand(&mut self, brand: String) {
        self.seen_lower.insert(brand.to_lowercase());
        for word in brand.split_whitespace() {
            self.seen_lower.insert(word.to_lowercase());
        }
        self.terms.push(brand);
    }

    fn push(&mut self, term: &str) -> bool {
        if self.contains(term) {
            return false;
        }
        self.seen_lower.insert(term.to_lowercase());
        self.terms.push(term.to_string());
        true
    }
}

/// Title normalizer with an injected tagger.
#[derive(Debug, Clone)]
pub struct TitleNormalizer<T> {
    tagger: T,
    filter: NoiseFilter,
    max_len: usize,
}

impl<T: Tagger> TitleNormalizer<T> {
    pub fn new(tagger: T) -> Self {
        Self {
            tagger,
            filter: NoiseFilter::default(),
            max_len: MAX_TITLE_LEN,
        }
    }

    pub fn with_noise_filter(mut self, filter: NoiseFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn noise_filter(&self) -> NoiseFilter {
        self.filter
    }

    /// Normalizes a possibly missing title. Missing input yields an empty string.
    pub fn normalize_field(&self, title: Option<&str>) -> String {
        title.map(|t| self.normalize(t)).unwrap_or_default()
    }

    pub fn normalize(&self, title: &str) -> String {
        let original = title.trim();
        if original.is_empty() {
            return String::new();
        }

        let lowered = noise::strip_brackets(&original.to_lowercase());
        let stripped = noise::strip_noise(&lowered);
        let tokens = self.tagger.tag(&stripped.text);

        let mut terms = TermSet::default();
        if let Some(brand) = detect_brand(original) {
            terms.push_brand(brand);
        }
        for token in tokens.iter().filter(|t| t.is_significant()) {
            if self.filter.rejects(&token.text, &stripped) {
                continue;
            }
            if is_candidate(token) {
                terms.push(&token.text);
            }
        }

        let rendered: Vec<String> = terms
            .terms
            .iter()
            .map(|term| apply_casing(term, original))
            .collect();
        let result = truncate_words(rendered.join(" ").trim(), self.max_len);

        if result.is_empty() {
            self.fallback(original)
        } else {
            result
        }
    }

    fn fallback(&self, original: &str) -> String {
        let words: Vec<String> = self
            .tagger
            .tag(original)
            .into_iter()
            .filter(|t| t.is_significant() && t.text.chars().count() > 1)
            .take(FALLBACK_TERMS)
            .map(|t| capitalize(&t.text))
            .collect();

        let joined = truncate_words(words.join(" ").trim(), self.max_len);
        if !joined.is_empty() {
            return joined;
        }
        original
            .chars()
            .take(FALLBACK_RAW_LEN)
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// Chains up to three leading title-cased words of the original title.
///
/// A word that is itself noise (`Series`, `(Black)`) ends the chain.
fn detect_brand(original: &str) -> Option<String> {
    let brand: Vec<&str> = original
        .split_whitespace()
        .take(MAX_BRAND_WORDS)
        .take_while(|word| {
            is_title_case(word) && word.chars().count() > 1 && !noise::is_noise_word(word)
        })
        .collect();

    if brand.is_empty() {
        None
    } else {
        Some(brand.join(" "))
    }
}

fn is_candidate(token: &Token) -> bool {
    let text = token.text.as_str();
    let long_enough = text.chars().count() > 1;

    if MODEL_NUMBER.is_match(text) {
        return true;
    }
    if token.pos == PosClass::ProperNoun
        || (is_title_case(text) && long_enough)
        || (text.to_uppercase() == text && long_enough)
    {
        return true;
    }
    token.pos == PosClass::CommonNoun && long_enough
}

/// Uppercase when the term's span in the original title is all caps, else capitalized.
fn apply_casing(term: &str, original: &str) -> String {
    match find_ignore_case(original, term) {
        Some(span) if is_upper(span) => term.to_uppercase(),
        _ => term
            .split(' ')
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// First span of `haystack` equal to `needle` ignoring case.
fn find_ignore_case<'a>(haystack: &'a str, needle: &str) -> Option<&'a str> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }

    for (start, _) in haystack.char_indices() {
        let mut matched = 0;
        for (offset, c) in haystack[start..].char_indices() {
            let mut lower = c.to_lowercase();
            if !lower.all(|lc| {
                let hit = needle.get(matched) == Some(&lc);
                matched += 1;
                hit
            }) {
                break;
            }
            if matched == needle.len() {
                return Some(&haystack[start..start + offset + c.len_utf8()]);
            }
        }
    }
    None
}

/// Cuts to `max_len` characters at the last word boundary and appends an ellipsis.
fn truncate_words(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let head: String = text.chars().take(max_len).collect();
    match head.rfind(' ') {
        Some(idx) => format!("{}{}", &head[..idx], ELLIPSIS),
        None => format!("{}{}", head, ELLIPSIS),
    }
}

/// First character upper-cased, the rest lower-cased.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Title case: every cased run starts upper-case and continues lower-case.
pub fn is_title_case(word: &str) -> bool {
    let mut prev_cased = false;
    let mut any_cased = false;

    for c in word.chars() {
        if c.is_uppercase() {
            if prev_cased {
                return false;
            }
            prev_cased = true;
            any_cased = true;
        } else if c.is_lowercase() {
            if !prev_cased {
                return false;
            }
            prev_cased = true;
            any_cased = true;
        } else {
            prev_cased = false;
        }
    }
    any_cased
}

/// At least one cased character and none of them lower-case.
pub fn is_upper(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::RuleTagger;

    // Small fixed list so results don't depend on the bundled stop-word corpus.
    const STOPWORDS: &[&str] = &[
        "a", "an", "the", "and", "or", "for", "with", "of", "to", "in", "on", "by", "is", "it",
    ];

    fn normalizer() -> TitleNormalizer<RuleTagger> {
        TitleNormalizer::new(RuleTagger::with_stopwords(STOPWORDS))
    }

    #[test]
    fn test_empty_and_missing_input() {
        let n = normalizer();
        assert_eq!(n.normalize(""), "");
        assert_eq!(n.normalize("   \t\n"), "");
        assert_eq!(n.normalize_field(None), "");
    }

    #[test]
    fn test_apple_watch_brand_first() {
        let out = normalizer().normalize("Apple Watch Series 8 GPS 41mm (Midnight)");
        assert!(out.starts_with("Apple Watch"), "{}", out);
        assert_eq!(out, "Apple Watch 8 41mm");
        for noise in ["Series", "GPS", "Gps", "Midnight"] {
            assert!(!out.contains(noise), "{} contains {}", out, noise);
        }
    }

    #[test]
    fn test_clean_label_is_stable() {
        let n = normalizer();
        let once = n.normalize("Samsung S22");
        assert_eq!(once, "Samsung S22");
        assert_eq!(n.normalize(&once), once);
    }

    #[test]
    fn test_case_insensitive_dedup() {
        let out = normalizer().normalize("SONY Sony WH-1000XM5 Headphones");
        assert_eq!(out, "SONY WH-1000XM5 Headphones");
        assert_eq!(out.to_lowercase().matches("sony").count(), 1);
    }

    #[test]
    fn test_noise_only_title_uses_word_fallback() {
        let out = normalizer().normalize("(Black) Wireless Charger Cable for Phone");
        assert_eq!(out, "Black Wireless Charger Cable Phone");
    }

    #[test]
    fn test_default_tagger_keeps_reference_titles() {
        let n = TitleNormalizer::new(RuleTagger::new());
        assert_eq!(n.normalize("Apple Watch Series 8 GPS 41mm (Midnight)"), "Apple Watch 8 41mm");
        assert_eq!(n.normalize("Samsung S22"), "Samsung S22");
        assert_eq!(n.normalize("SONY Sony WH-1000XM5 Headphones"), "SONY WH-1000XM5 Headphones");
        assert_eq!(
            n.normalize("(Black) Wireless Charger Cable for Phone"),
            "Black Wireless Charger Cable Phone"
        );
    }

    #[test]
    fn test_default_tagger_keeps_tv_terms() {
        let n = TitleNormalizer::new(RuleTagger::new());
        assert_eq!(n.normalize("SAMSUNG 55-Inch Class Crystal 4K TV"), "SAMSUNG 55-inch Class TV");
        assert_eq!(
            n.normalize("TCL 43-Inch Class S4 4K LED Smart TV with Fire TV"),
            "TCL 43-inch Class S4 LED Smart TV Fire"
        );
        assert_eq!(
            n.normalize("amazon fire tv stick 4k with alexa voice remote"),
            "Amazon Fire Tv Stick Alexa Voice Remote"
        );
    }

    #[test]
    fn test_find_ignore_case() {
        assert_eq!(find_ignore_case("SONY Sony WH-1000XM5", "sony"), Some("SONY"));
        assert_eq!(find_ignore_case("Galaxy S22", "s22"), Some("S22"));
        assert_eq!(find_ignore_case("Café Bar", "CAFÉ"), Some("Café"));
        assert_eq!(find_ignore_case("Apple", "pear"), None);
        assert_eq!(find_ignore_case("Apple", ""), None);
    }

    #[test]
    fn test_raw_fallback_when_nothing_significant() {
        let out = normalizer().normalize("(a) [b] - !");
        assert_eq!(out, "(a) [b] - !");
        let long = "- ".repeat(60);
        let out = normalizer().normalize(&long);
        assert!(out.chars().count() <= FALLBACK_RAW_LEN);
    }

    #[test]
    fn test_uppercase_terms_preserved() {
        let out = normalizer().normalize("anker USB hub 7-in-1");
        assert!(out.contains("USB"), "{}", out);
        assert!(out.starts_with("Anker"), "{}", out);
    }

    #[test]
    fn test_long_result_truncated_at_word_boundary() {
        let title = "Alpha Beta Gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi \
                     omicron pi rho sigma tau upsilon phi chi psi omega";
        let out = normalizer().normalize(title);
        assert!(out.ends_with("..."), "{}", out);
        assert!(out.chars().count() <= MAX_TITLE_LEN + 3);
        let body = out.trim_end_matches("...");
        assert!(title.to_lowercase().contains(&body.split(' ').last().unwrap().to_lowercase()));
    }

    #[test]
    fn test_truncate_without_space() {
        let word = "x".repeat(80);
        let out = truncate_words(&word, 70);
        assert_eq!(out.chars().count(), 73);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_pattern_source_filter_rejects_unrelated_token() {
        // "with" survives stripping ("compatible" is absent) but sits in a pattern source.
        let n = TitleNormalizer::new(RuleTagger::with_stopwords(&[]));
        let out = n.normalize("zeta hub with dock");
        assert_eq!(out, "Zeta Hub Dock");
    }

    #[test]
    fn test_stripped_spans_filter_keeps_unrelated_token() {
        let n = TitleNormalizer::new(RuleTagger::with_stopwords(&[]))
            .with_noise_filter(NoiseFilter::StrippedSpans);
        assert_eq!(n.noise_filter(), NoiseFilter::StrippedSpans);
        let out = n.normalize("zeta hub with dock");
        assert_eq!(out, "Zeta Hub With Dock");
    }

    #[test]
    fn test_model_numbers() {
        for model in ["M1", "S22", "iPhone13", "735", "wh1000"] {
            assert!(MODEL_NUMBER.is_match(model), "{}", model);
        }
        assert!(!MODEL_NUMBER.is_match("earbuds"));
        assert!(!MODEL_NUMBER.is_match("wh-1000xm5"));
    }

    #[test]
    fn test_title_case_and_upper() {
        assert!(is_title_case("Apple"));
        assert!(is_title_case("S22"));
        assert!(is_title_case("(Black)"));
        assert!(!is_title_case("SONY"));
        assert!(!is_title_case("iPhone"));
        assert!(!is_title_case("735"));
        assert!(is_upper("WH-1000XM5"));
        assert!(!is_upper("41mm"));
        assert!(!is_upper("735"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("iPhone13"), "Iphone13");
        assert_eq!(capitalize("speaker"), "Speaker");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_output_length_bound() {
        let n = normalizer();
        let titles = [
            "Samsung Galaxy S23 Ultra 256GB Phantom Black Unlocked Smartphone (US Version)",
            "JBL Flip 6 Portable Bluetooth Speaker, Powerful Sound and deep bass, IPX7 Waterproof",
            "[2024 Upgraded] Wireless Earbuds Bluetooth 5.3 Headphones 40H Playback LED Power Display",
            "",
        ];
        for title in titles {
            assert!(n.normalize(title).chars().count() <= MAX_TITLE_LEN + 3, "{}", title);
        }
    }
}
