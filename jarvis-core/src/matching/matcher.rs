//! Picking the best catalog command for an utterance.

use tracing::{debug, info, warn};

use super::similarity::{Similarity, SimilarityScorer, Thresholds};
use crate::commands::{Command, CommandCatalog};

/// The winning command for an utterance.
#[derive(Debug, Clone, Copy)]
pub struct CommandMatch<'c> {
    pub command: &'c Command,
    /// The phrase of `command` that scored best.
    pub phrase: &'c str,
    pub similarity: Similarity,
}

impl CommandMatch<'_> {
    pub fn score(&self) -> f64 {
        self.similarity.combined()
    }
}

/// Ranks every (command, phrase) pair of a catalog against an utterance.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandMatcher {
    scorer: SimilarityScorer,
}

impl CommandMatcher {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            scorer: SimilarityScorer::new(thresholds),
        }
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    /// Best eligible pair, or `None`.
    ///
    /// A pair replaces the current best only with a strictly higher combined
    /// score, so on ties the command inserted first wins.
    pub fn find<'c>(&self, utterance: &str, catalog: &'c CommandCatalog) -> Option<CommandMatch<'c>> {
        info!(utterance, "Searching command");

        let mut best: Option<CommandMatch<'c>> = None;

        for command in catalog {
            for phrase in &command.phrases {
                let similarity = self.scorer.score(utterance, phrase);
                debug!(
                    phrase = %phrase,
                    fuzzy = similarity.fuzzy,
                    jaccard = format!("{:.2}", similarity.jaccard),
                    "Scored phrase"
                );

                if !similarity.clears(self.scorer.thresholds()) {
                    continue;
                }
                let beats_best = best
                    .as_ref()
                    .map_or(true, |b| similarity.combined() > b.score());
                if beats_best {
                    best = Some(CommandMatch {
                        command,
                        phrase,
                        similarity,
                    });
                }
            }
        }

        match &best {
            Some(m) => info!(
                command = m.command.label(),
                phrase = m.phrase,
                score = m.score(),
                "Command found"
            ),
            None => warn!(utterance, "Command not found"),
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandSource;

    fn catalog(yaml: &str) -> CommandCatalog {
        CommandCatalog::from_sources([CommandSource::new("test", yaml)])
    }

    const APPS: &str = r#"
list:
  - command: {action: exe, exe_path: apps/notepad.exe}
    voice: {sounds: [ok]}
    phrases: ["открой блокнот"]
  - command: {action: cli, cli_cmd: taskkill, cli_args: ["/IM", "chrome.exe"]}
    voice: {sounds: [ok]}
    phrases: ["закрой браузер", "выключи браузер"]
"#;

    #[test]
    fn test_exact_phrase_scores_100() {
        let catalog = catalog(APPS);
        let m = CommandMatcher::default().find("открой блокнот", &catalog).unwrap();
        assert_eq!(m.command.label(), "открой блокнот");
        assert_eq!(m.score(), 100.0);
    }

    #[test]
    fn test_second_phrase_of_command_matches() {
        let catalog = catalog(APPS);
        let m = CommandMatcher::default()
            .find("джарвис выключи браузер", &catalog)
            .unwrap();
        assert_eq!(m.phrase, "выключи браузер");
        assert_eq!(m.command.label(), "закрой браузер");
    }

    #[test]
    fn test_gibberish_has_no_match() {
        let catalog = catalog(APPS);
        assert!(CommandMatcher::default().find("бла бла бла", &catalog).is_none());
    }

    #[test]
    fn test_empty_catalog_has_no_match() {
        let catalog = CommandCatalog::default();
        assert!(CommandMatcher::default().find("открой блокнот", &catalog).is_none());
    }

    #[test]
    fn test_tie_goes_to_first_inserted_command() {
        let catalog = catalog(
            r#"
list:
  - command: {action: voice}
    voice: {sounds: [first]}
    phrases: ["открой браузер"]
  - command: {action: voice}
    voice: {sounds: [second]}
    phrases: ["открой браузер"]
"#,
        );
        let m = CommandMatcher::default().find("открой браузер", &catalog).unwrap();
        assert_eq!(m.command.sounds(), ["first".to_string()]);
    }

    #[test]
    fn test_find_is_deterministic() {
        let catalog = catalog(APPS);
        let matcher = CommandMatcher::default();
        let first = matcher.find("закрой браузер", &catalog).map(|m| m.command.clone());
        for _ in 0..5 {
            let again = matcher.find("закрой браузер", &catalog).map(|m| m.command.clone());
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_threshold_gating_rejects_vocabulary_mismatch() {
        let catalog = catalog(
            r#"
list:
  - command: {action: voice}
    voice: {sounds: [music]}
    phrases: ["музыку"]
"#,
        );
        let matcher = CommandMatcher::default();
        assert!(matcher
            .find("включи музыку громче пожалуйста сейчас", &catalog)
            .is_none());
    }

    #[test]
    fn test_threshold_gating_rejects_word_salad() {
        let catalog = catalog(
            r#"
list:
  - command: {action: voice}
    voice: {sounds: [window]}
    phrases: ["закрой окно"]
"#,
        );
        assert!(CommandMatcher::default().find("окно закрой", &catalog).is_none());
    }

    #[test]
    fn test_pair_exactly_at_both_thresholds_matches() {
        let catalog = catalog(
            r#"
list:
  - command: {action: voice}
    voice: {sounds: [edge]}
    phrases: ["окно забыл"]
"#,
        );
        let m = CommandMatcher::default().find("окно закат", &catalog).unwrap();
        assert_eq!(m.similarity.fuzzy, 70.0);
        assert!((m.score() - 70.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_pair_one_point_below_fuzzy_threshold_is_rejected() {
        let catalog = catalog(
            r#"
list:
  - command: {action: voice}
    voice: {sounds: [edge]}
    phrases: ["окно забывали"]
"#,
        );
        // fuzzy 69, jaccard 1/3
        assert!(CommandMatcher::default().find("окно закатала", &catalog).is_none());
    }

    #[test]
    fn test_custom_thresholds_admit_weaker_pairs() {
        let catalog = catalog(
            r#"
list:
  - command: {action: voice}
    voice: {sounds: [window]}
    phrases: ["закрой окно"]
"#,
        );
        let lenient = CommandMatcher::new(Thresholds {
            fuzzy: 50.0,
            jaccard: 0.3,
        });
        let m = lenient.find("окно закрой", &catalog).unwrap();
        assert_eq!(m.score(), 55.0);
    }
}
