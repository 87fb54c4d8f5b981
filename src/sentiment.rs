//! Lexicon-based sentiment scoring for social mentions.
//!
//! Scores follow the VADER approach: per-word valences in `[-4, 4]` adjusted for
//! boosters, capitalization, negation, contrastive "but" and exclamation marks, then
//! squashed into a compound score in `[-1, 1]`.
//!
//! The analyzer is an ordinary value. Build one and share it (`Arc`) with whoever needs
//! to score text.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use utoipa::ToSchema;

/// Compound score at or above which text counts as positive.
pub const POSITIVE_THRESHOLD: f64 = 0.2;
/// Compound score at or below which text counts as negative.
pub const NEGATIVE_THRESHOLD: f64 = -0.2;

const NORMALIZATION_ALPHA: f64 = 15.0;
const BOOSTER_INCREMENT: f64 = 0.293;
const CAPS_INCREMENT: f64 = 0.733;
const NEGATION_SCALAR: f64 = -0.74;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
const NEGATION_WINDOW: usize = 3;

/// Bundled lexicon, one `word<TAB>valence` entry per line. Extra tab-separated columns
/// are ignored, so the upstream `vader_lexicon.txt` format loads unchanged.
const LEXICON_DATA: &str = include_str!("sentiment_lexicon.tsv");

static BASE_LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| parse_lexicon(LEXICON_DATA));

const BOOSTERS: &[(&str, f64)] = &[
    ("absolutely", BOOSTER_INCREMENT), ("amazingly", BOOSTER_INCREMENT),
    ("completely", BOOSTER_INCREMENT), ("extremely", BOOSTER_INCREMENT),
    ("highly", BOOSTER_INCREMENT), ("incredibly", BOOSTER_INCREMENT),
    ("really", BOOSTER_INCREMENT), ("so", BOOSTER_INCREMENT), ("super", BOOSTER_INCREMENT),
    ("totally", BOOSTER_INCREMENT), ("very", BOOSTER_INCREMENT), ("most", BOOSTER_INCREMENT),
    ("barely", -BOOSTER_INCREMENT), ("hardly", -BOOSTER_INCREMENT),
    ("kinda", -BOOSTER_INCREMENT), ("slightly", -BOOSTER_INCREMENT),
    ("somewhat", -BOOSTER_INCREMENT), ("marginally", -BOOSTER_INCREMENT),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nothing", "nobody", "neither", "nor", "without",
    "cannot", "cant", "can't", "dont", "don't", "doesnt", "doesn't", "didnt", "didn't",
    "isnt", "isn't", "wasnt", "wasn't", "wont", "won't", "aint", "ain't", "hardly",
];

/// Sentiment class derived from a compound score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= POSITIVE_THRESHOLD {
            SentimentLabel::Positive
        } else if score <= NEGATIVE_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Some(SentimentLabel::Positive),
            "negative" => Some(SentimentLabel::Negative),
            "neutral" => Some(SentimentLabel::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proportions of negative, neutral and positive signal plus the compound score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct PolarityScores {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
    pub compound: f64,
}

/// Word-list sentiment analyzer.
#[derive(Debug, Clone)]
pub struct SentimentAnalyzer {
    lexicon: HashMap<String, f64>,
    boosters: HashMap<String, f64>,
    negations: HashSet<String>,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self {
            lexicon: BASE_LEXICON.clone(),
            boosters: BOOSTERS.iter().map(|(w, v)| (w.to_string(), *v)).collect(),
            negations: NEGATIONS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Bundled lexicon extended (and overridden) by the entries in `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sentiment lexicon {}", path.display()))?;
        let extra = parse_lexicon(&data);
        if extra.is_empty() {
            anyhow::bail!("No lexicon entries found in {}", path.display());
        }
        tracing::info!("📖 Loaded {} lexicon entries from {}", extra.len(), path.display());

        let mut analyzer = Self::new();
        analyzer.lexicon.extend(extra);
        Ok(analyzer)
    }

    /// Bundled lexicon, plus the entries in `path` when one is configured.
    pub fn from_lexicon_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::new()),
        }
    }

    pub fn lexicon_len(&self) -> usize {
        self.lexicon.len()
    }

    /// Adds or overrides lexicon entries, e.g. domain slang.
    pub fn with_words(mut self, words: &[(&str, f64)]) -> Self {
        for (word, valence) in words {
            self.lexicon.insert(word.to_lowercase(), valence.clamp(-4.0, 4.0));
        }
        self
    }

    /// Compound score for an optional piece of text. Missing text scores 0.0.
    pub fn score(&self, text: Option<&str>) -> f64 {
        text.map(|t| self.polarity_scores(t).compound).unwrap_or(0.0)
    }

    pub fn label(&self, text: Option<&str>) -> SentimentLabel {
        SentimentLabel::from_score(self.score(text))
    }

    pub fn polarity_scores(&self, text: &str) -> PolarityScores {
        let words: Vec<&str> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return PolarityScores { neu: 1.0, ..Default::default() };
        }

        let caps_differential = has_caps_differential(&words);
        let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();

        let mut valences: Vec<f64> = Vec::with_capacity(words.len());
        for (i, word) in words.iter().enumerate() {
            let lower = &lowered[i];
            if self.boosters.contains_key(lower) {
                valences.push(0.0);
                continue;
            }
            let Some(&base) = self.lexicon.get(lower) else {
                valences.push(0.0);
                continue;
            };

            let mut valence = base;
            if caps_differential && is_all_caps(word) {
                valence += CAPS_INCREMENT * valence.signum();
            }

            for distance in 1..=NEGATION_WINDOW.min(i) {
                let prior = &lowered[i - distance];
                if let Some(&boost) = self.boosters.get(prior) {
                    let damping = match distance {
                        1 => 1.0,
                        2 => 0.95,
                        _ => 0.9,
                    };
                    let mut scalar = boost * damping * valence.signum();
                    if caps_differential && is_all_caps(words[i - distance]) {
                        scalar += CAPS_INCREMENT * valence.signum();
                    }
                    valence += scalar;
                }
                if self.negations.contains(prior) || prior.ends_with("n't") {
                    valence *= NEGATION_SCALAR;
                }
            }
            valences.push(valence);
        }

        apply_but_rule(&lowered, &mut valences);

        let punctuation = exclamation_emphasis(text);
        let sum: f64 = valences.iter().sum();
        let compound = if sum == 0.0 {
            0.0
        } else {
            normalize(sum + punctuation * sum.signum())
        };

        let (mut pos, mut neg, mut neu) = (0.0, 0.0, 0.0);
        for v in &valences {
            if *v > 0.0 {
                pos += v + 1.0;
            } else if *v < 0.0 {
                neg += v - 1.0;
            } else {
                neu += 1.0;
            }
        }
        if pos > neg.abs() {
            pos += punctuation;
        } else if pos < neg.abs() {
            neg -= punctuation;
        }

        let total = pos + neg.abs() + neu;
        PolarityScores {
            neg: round3(neg.abs() / total),
            neu: round3(neu / total),
            pos: round3(pos / total),
            compound: round4(compound),
        }
    }
}

/// Parses `word<TAB>valence[<TAB>...]` lines. Blank, `#` and malformed lines are skipped.
pub fn parse_lexicon(data: &str) -> HashMap<String, f64> {
    data.lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let word = fields.next()?.trim();
            let valence: f64 = fields.next()?.trim().parse().ok()?;
            if word.is_empty() || !valence.is_finite() {
                return None;
            }
            Some((word.to_lowercase(), valence.clamp(-4.0, 4.0)))
        })
        .collect()
}

fn normalize(score: f64) -> f64 {
    (score / (score * score + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0)
}

fn is_all_caps(word: &str) -> bool {
    word.chars().any(char::is_alphabetic) && !word.chars().any(char::is_lowercase)
}

// Emphasis only counts when some, but not all, words are shouted.
fn has_caps_differential(words: &[&str]) -> bool {
    let caps = words.iter().filter(|w| is_all_caps(w)).count();
    caps > 0 && caps < words.len()
}

// Words before "but" are dampened, words after it emphasized.
fn apply_but_rule(lowered: &[String], valences: &mut [f64]) {
    if let Some(pivot) = lowered.iter().position(|w| w == "but") {
        for (i, v) in valences.iter_mut().enumerate() {
            if i < pivot {
                *v *= 0.5;
            } else if i > pivot {
                *v *= 1.5;
            }
        }
    }
}

fn exclamation_emphasis(text: &str) -> f64 {
    let count = text.matches('!').count().min(MAX_EXCLAMATIONS);
    count as f64 * EXCLAMATION_INCREMENT
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}
