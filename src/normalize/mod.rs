// Text normalization
// Cleans rendered help text into the canonical form used for embedding and prompting


use fancy_regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Closed, case-sensitive list of words dropped before embedding
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

const ASCII_SUBSTITUTE: char = '_';

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\-_;:\\$=]").expect("regex is valid"));

static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("regex is valid"));

/// A single, named step of the cleaning pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleaningStage {
    /// Control characters (tabs and line breaks included) become spaces
    StripControl,
    /// Removes everything but word characters, whitespace and `-_;:\$=`
    StripUnsafe,
    /// Drops exact matches from the stop-word list and rejoins with single spaces
    RemoveStopWords,
    /// Collapses whitespace runs to one space and trims the ends
    CollapseWhitespace,
    /// Replaces every non-ASCII character with `_`
    AsciiOnly,
}

impl CleaningStage {
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::StripControl => "strip-control",
            Self::StripUnsafe => "strip-unsafe",
            Self::RemoveStopWords => "remove-stop-words",
            Self::CollapseWhitespace => "collapse-whitespace",
            Self::AsciiOnly => "ascii-only",
        }
    }

    fn apply(self, text: &str, stop_words: &HashSet<String>) -> String {
        match self {
            Self::StripControl => text
                .chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect(),
            Self::StripUnsafe => UNSAFE_CHARS.replace_all(text, "").into_owned(),
            Self::RemoveStopWords => text
                .split_whitespace()
                .filter(|word| !stop_words.contains(*word))
                .collect::<Vec<_>>()
                .join(" "),
            Self::CollapseWhitespace => WHITESPACE_RUNS.replace_all(text, " ").trim().to_string(),
            Self::AsciiOnly => text
                .chars()
                .map(|c| if c.is_ascii() { c } else { ASCII_SUBSTITUTE })
                .collect(),
        }
    }
}

/// Ordered cleaning pipeline
#[derive(Debug, Clone)]
pub struct Normalizer {
    stages: Vec<CleaningStage>,
    stop_words: HashSet<String>,
}

impl Default for Normalizer {
    #[inline]
    fn default() -> Self {
        Self {
            stages: vec![
                CleaningStage::StripControl,
                CleaningStage::StripUnsafe,
                CleaningStage::RemoveStopWords,
                CleaningStage::CollapseWhitespace,
            ],
            stop_words: STOP_WORDS.iter().map(|w| (*w).to_string()).collect(),
        }
    }
}

impl Normalizer {
    /// Build a pipeline from an explicit stage list
    #[inline]
    pub fn with_stages(stages: Vec<CleaningStage>) -> Self {
        Self {
            stages,
            ..Self::default()
        }
    }

    /// Default pipeline followed by ASCII coercion
    #[inline]
    pub fn ascii_only() -> Self {
        let mut normalizer = Self::default();
        normalizer.stages.push(CleaningStage::AsciiOnly);
        normalizer
    }

    #[inline]
    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = words.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn stages(&self) -> &[CleaningStage] {
        &self.stages
    }

    #[inline]
    pub fn normalize(&self, raw: &str) -> String {
        self.stages
            .iter()
            .fold(raw.to_string(), |text, stage| stage.apply(&text, &self.stop_words))
    }
}

/// Normalize with the default pipeline
#[inline]
pub fn normalize(raw: &str) -> String {
    Normalizer::default().normalize(raw)
}
