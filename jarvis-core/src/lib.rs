//! Jarvis: a wake-word voice assistant.
//!
//! Listens for a wake word, records the follow-up utterance, transcribes it,
//! matches the text against a catalog of declarative YAML commands and runs
//! the matched action (launch a program, run a CLI, play a sound).

pub mod actions;
pub mod audio;
pub mod commands;
pub mod config;
pub mod filter;
pub mod logger;
pub mod matching;
pub mod process;
pub mod repl;
pub mod session;
pub mod stt;
pub mod vad;
pub mod wake_word;

pub use actions::{ActionHandler, ActionRegistry, Flow};
pub use commands::{Action, ActionKind, Command, CommandCatalog};
pub use config::{load_config, AssistantConfig, ConfigError};
pub use matching::{CommandMatch, CommandMatcher, SimilarityScorer, Thresholds};
pub use session::{AssistantContext, AssistantSession, Outcome, Phase, Step};
