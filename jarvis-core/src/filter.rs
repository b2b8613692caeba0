//! Stripping boilerplate from transcripts.
//!
//! Recognized text usually carries the assistant's name and filler words
//! ("джарвис, открой пожалуйста блокнот"). Those are removed as whole words,
//! case-insensitively, before matching. Punctuation is treated as a word
//! separator on both sides, so "Джарвис, открой блокнот." and a configured
//! "эй, джарвис" compare as plain words.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("separator pattern"));

/// Replace punctuation with spaces and collapse whitespace.
fn normalize(text: &str) -> String {
    NON_WORD.replace_all(text, " ").trim().to_string()
}

/// Removes configured phrases from recognized text.
#[derive(Debug, Clone, Default)]
pub struct PhraseFilter {
    patterns: Vec<Regex>,
}

impl PhraseFilter {
    /// Build a filter. Longer phrases are stripped first so that
    /// "джарвис пожалуйста" wins over "джарвис".
    pub fn new<I, S>(phrases: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut phrases: Vec<String> = phrases
            .into_iter()
            .map(|p| normalize(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        phrases.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));

        let patterns = phrases
            .iter()
            .map(|p| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(p))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Strip punctuation and every configured phrase, then collapse
    /// whitespace. An empty result means nothing but boilerplate was said.
    pub fn apply(&self, text: &str) -> String {
        let mut out = normalize(text);
        for pattern in &self.patterns {
            out = pattern.replace_all(&out, " ").into_owned();
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> PhraseFilter {
        PhraseFilter::new(["джарвис", "пожалуйста", "эй джарвис"]).unwrap()
    }

    #[test]
    fn test_strips_name_and_fillers() {
        assert_eq!(filter().apply("джарвис открой пожалуйста блокнот"), "открой блокнот");
    }

    #[test]
    fn test_is_case_insensitive() {
        assert_eq!(filter().apply("Эй Джарвис открой блокнот"), "открой блокнот");
    }

    #[test]
    fn test_keeps_words_containing_a_phrase() {
        let filter = PhraseFilter::new(["кот"]).unwrap();
        assert_eq!(filter.apply("открой котлету кот"), "открой котлету");
    }

    #[test]
    fn test_only_boilerplate_becomes_empty() {
        assert_eq!(filter().apply("  джарвис   пожалуйста "), "");
    }

    #[test]
    fn test_punctuated_boilerplate_becomes_empty() {
        let filter = PhraseFilter::new(["джарвис", "пожалуйста"]).unwrap();
        assert_eq!(filter.apply("Джарвис, пожалуйста."), "");
        assert_eq!(filter.apply("Джарвис."), "");
    }

    #[test]
    fn test_strips_punctuation_around_command() {
        assert_eq!(filter().apply("Джарвис, открой блокнот!"), "открой блокнот");
    }

    #[test]
    fn test_punctuated_phrase_matches_plain_text() {
        let filter = PhraseFilter::new(["эй, джарвис"]).unwrap();
        assert_eq!(filter.apply("Эй, Джарвис, открой блокнот."), "открой блокнот");
        assert_eq!(filter.apply("эй джарвис открой блокнот"), "открой блокнот");
    }

    #[test]
    fn test_empty_filter_only_normalizes_whitespace() {
        let filter = PhraseFilter::new(Vec::<String>::new()).unwrap();
        assert_eq!(filter.apply(" открой   блокнот "), "открой блокнот");
    }
}
