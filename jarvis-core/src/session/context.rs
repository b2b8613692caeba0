//! Everything built once at startup and shared by the voice loop and REPL.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use crate::actions::{ActionRegistry, Flow, HandlerEnv};
use crate::audio::{play_random_from_dir, SoundLibrary, SoundPlayer};
use crate::commands::CommandCatalog;
use crate::config::AssistantConfig;
use crate::filter::PhraseFilter;
use crate::matching::CommandMatcher;
use crate::process::ProcessControl;

/// How one piece of text was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left after removing boilerplate; the matcher was not run.
    Empty,
    NoMatch,
    Dispatched { command: String, flow: Flow },
}

/// Catalog, matcher, filter, actions and sounds.
pub struct AssistantContext {
    pub catalog: Arc<CommandCatalog>,
    pub matcher: CommandMatcher,
    pub filter: PhraseFilter,
    pub registry: Arc<ActionRegistry>,
    pub sounds: SoundLibrary,
    /// Directory of greeting WAVs played on wake.
    pub greetings: PathBuf,
    pub debounce: Duration,
}

impl AssistantContext {
    /// Assemble a context around an already loaded catalog.
    pub fn new(
        config: &AssistantConfig,
        catalog: CommandCatalog,
        player: Arc<dyn SoundPlayer>,
        processes: Arc<dyn ProcessControl>,
    ) -> anyhow::Result<Self> {
        let filter = PhraseFilter::new(&config.assistant_tbr_phrases)
            .context("Invalid assistant_tbr_phrases")?;
        let sounds = SoundLibrary::new(&config.sound_directory, player);
        let env = HandlerEnv::from_config(config, sounds.clone(), processes);

        Ok(Self {
            catalog: Arc::new(catalog),
            matcher: CommandMatcher::new(config.thresholds()),
            filter,
            registry: Arc::new(ActionRegistry::with_default_handlers(env)),
            sounds,
            greetings: config.hello_phrases_path.clone(),
            debounce: config.debounce_window()?,
        })
    }

    /// Load the catalog from `commands_path` and assemble a context.
    pub fn load(
        config: &AssistantConfig,
        player: Arc<dyn SoundPlayer>,
        processes: Arc<dyn ProcessControl>,
    ) -> anyhow::Result<Self> {
        let catalog = CommandCatalog::load(&config.commands_path)?;
        if catalog.is_empty() {
            warn!(root = %config.commands_path.display(), "No commands loaded");
        }
        Self::new(config, catalog, player, processes)
    }

    /// Play a random greeting. Failure is logged, never fatal.
    pub fn greet(&self) {
        if let Err(e) = play_random_from_dir(&**self.sounds.player(), &self.greetings) {
            warn!(error = %format!("{e:#}"), "Greeting failed");
        }
    }

    /// Filter, match and dispatch one transcript.
    pub fn handle_text(&self, transcript: &str) -> Outcome {
        let text = self.filter.apply(transcript);
        if text.is_empty() {
            info!(transcript, "Empty command");
            return Outcome::Empty;
        }

        let Some(found) = self.matcher.find(&text, &self.catalog) else {
            return Outcome::NoMatch;
        };
        let flow = self.registry.dispatch_chain([found.command]);
        Outcome::Dispatched {
            command: found.command.label().to_string(),
            flow,
        }
    }
}

impl std::fmt::Debug for AssistantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantContext")
            .field("commands", &self.catalog.len())
            .field("registry", &self.registry)
            .field("sounds", &self.sounds)
            .field("greetings", &self.greetings)
            .finish()
    }
}
