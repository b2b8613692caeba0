//! Utterance-to-command matching.

mod matcher;
mod similarity;

pub use matcher::{CommandMatch, CommandMatcher};
pub use similarity::{jaccard, partial_ratio, tokens, Similarity, SimilarityScorer, Thresholds};
