//! Phrase similarity measures.
//!
//! Two measures are combined: a partial-ratio fuzzy score that tolerates
//! extra words around the phrase, and a Jaccard overlap of the word sets
//! that rejects pairs sharing letters but not vocabulary.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Word tokens: runs of two or more word characters. Single-letter words
/// ("я", "a") carry no meaning for matching and are dropped.
static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern"));

/// Minimum scores a pair must reach on each measure independently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Partial-ratio score, 0..=100.
    pub fuzzy: f64,
    /// Jaccard overlap, 0.0..=1.0.
    pub jaccard: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            fuzzy: 70.0,
            jaccard: 0.3,
        }
    }
}

/// Both measures for one (utterance, phrase) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub fuzzy: f64,
    pub jaccard: f64,
}

impl Similarity {
    /// `fuzzy × jaccard`, in 0..=100.
    pub fn combined(&self) -> f64 {
        self.fuzzy * self.jaccard
    }

    pub fn clears(&self, thresholds: &Thresholds) -> bool {
        self.fuzzy >= thresholds.fuzzy && self.jaccard >= thresholds.jaccard
    }
}

/// Scores utterances against candidate phrases.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityScorer {
    thresholds: Thresholds,
}

impl SimilarityScorer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn score(&self, utterance: &str, phrase: &str) -> Similarity {
        Similarity {
            fuzzy: partial_ratio(utterance, phrase),
            jaccard: jaccard(utterance, phrase),
        }
    }

    /// Score a pair and return it only if both thresholds are cleared.
    pub fn eligible(&self, utterance: &str, phrase: &str) -> Option<Similarity> {
        let similarity = self.score(utterance, phrase);
        similarity.clears(&self.thresholds).then_some(similarity)
    }
}

/// Case-insensitive partial ratio in 0..=100.
///
/// The shorter string is slid over every equal-length window of the longer
/// one and the best Indel ratio wins.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 100.0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let width = shorter.len();

    let mut best = 0.0_f64;
    for start in 0..=longer.len() - width {
        let ratio = indel_ratio(shorter, &longer[start..start + width]);
        if ratio > best {
            best = ratio;
            if best > 0.995 {
                return 100.0;
            }
        }
    }

    (best * 100.0).round()
}

/// `2·LCS / (|a| + |b|)`: one minus the normalized insert/delete distance.
fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2 * lcs_len(a, b)) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Lowercased word-token set of `text`.
pub fn tokens(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Jaccard overlap of the token sets, 0.0..=1.0. Empty union scores 0.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let a = tokens(a);
    let b = tokens(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}
