//! Action dispatch.
//!
//! Each [`ActionKind`] maps to one [`ActionHandler`] in an
//! [`ActionRegistry`] built once at startup. Dispatch never fails: unknown
//! kinds, handler errors and handler panics are logged and absorbed here.

mod handlers;

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::audio::SoundLibrary;
use crate::commands::{ActionKind, Command};
use crate::config::AssistantConfig;
use crate::process::ProcessControl;

pub use handlers::{termination_target, CliHandler, ControlHandler, ExeHandler, VoiceHandler};

/// What the caller should do after an action ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Skip the remaining commands of this utterance.
    StopChaining,
    /// End the session.
    Terminate,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "continue"),
            Self::StopChaining => write!(f, "stop_chaining"),
            Self::Terminate => write!(f, "terminate"),
        }
    }
}

/// Performs one kind of action for a matched command.
pub trait ActionHandler: Send + Sync {
    fn handle(&self, command: &Command) -> anyhow::Result<Flow>;
}

impl<F> ActionHandler for F
where
    F: Fn(&Command) -> anyhow::Result<Flow> + Send + Sync,
{
    fn handle(&self, command: &Command) -> anyhow::Result<Flow> {
        self(command)
    }
}

/// Everything the built-in handlers need from the outside world.
#[derive(Clone)]
pub struct HandlerEnv {
    pub sounds: SoundLibrary,
    pub processes: Arc<dyn ProcessControl>,
    /// `exe` paths are relative to this directory.
    pub app_root: PathBuf,
    /// Played when a termination target is not running.
    pub not_running_sound: String,
    /// Program names treated as process-termination utilities.
    pub terminate_programs: Vec<String>,
}

impl HandlerEnv {
    pub fn from_config(
        config: &AssistantConfig,
        sounds: SoundLibrary,
        processes: Arc<dyn ProcessControl>,
    ) -> Self {
        Self {
            sounds,
            processes,
            app_root: config.app_root.clone(),
            not_running_sound: config.not_running_sound.clone(),
            terminate_programs: config.terminate_programs.clone(),
        }
    }
}

/// Maps action kinds to handlers.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<ActionKind, Box<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a handler for every [`ActionKind`].
    pub fn with_default_handlers(env: HandlerEnv) -> Self {
        let mut registry = Self::new();
        registry.register(ActionKind::Voice, VoiceHandler::new(env.sounds.clone()));
        registry.register(ActionKind::Exe, ExeHandler::new(env.clone()));
        registry.register(ActionKind::Cli, CliHandler::new(env.clone()));
        registry.register(
            ActionKind::Terminate,
            ControlHandler::new(env.sounds.clone(), Flow::Terminate),
        );
        registry.register(
            ActionKind::StopChaining,
            ControlHandler::new(env.sounds, Flow::StopChaining),
        );
        registry
    }

    /// Install `handler` for `kind`. The last registration wins; the
    /// replaced handler is returned.
    pub fn register<H>(&mut self, kind: ActionKind, handler: H) -> Option<Box<dyn ActionHandler>>
    where
        H: ActionHandler + 'static,
    {
        let previous = self.handlers.insert(kind, Box::new(handler));
        if previous.is_some() {
            info!(%kind, "Action handler replaced");
        }
        previous
    }

    pub fn contains(&self, kind: ActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `command`.
    pub fn dispatch(&self, command: &Command) -> Flow {
        let kind = command.kind();
        let Some(handler) = self.handlers.get(&kind) else {
            warn!(%kind, command = command.label(), "Unknown action");
            return Flow::Continue;
        };

        info!(%kind, command = command.label(), "Dispatching action");
        match catch_unwind(AssertUnwindSafe(|| handler.handle(command))) {
            Ok(Ok(flow)) => flow,
            Ok(Err(e)) => {
                error!(%kind, command = command.label(), error = %format!("{e:#}"), "Action failed");
                Flow::Continue
            }
            Err(panic) => {
                error!(
                    %kind,
                    command = command.label(),
                    panic = panic_message(panic.as_ref()),
                    "Action handler panicked"
                );
                Flow::Continue
            }
        }
    }

    /// Dispatch `commands` in order until one asks to stop.
    ///
    /// `StopChaining` ends the chain and the result is `Continue`;
    /// `Terminate` ends the chain and is returned.
    pub fn dispatch_chain<'c, I>(&self, commands: I) -> Flow
    where
        I: IntoIterator<Item = &'c Command>,
    {
        for command in commands {
            match self.dispatch(command) {
                Flow::Continue => {}
                Flow::StopChaining => {
                    info!(command = command.label(), "Command chain stopped");
                    return Flow::Continue;
                }
                Flow::Terminate => return Flow::Terminate,
            }
        }
        Flow::Continue
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<String> = self.handlers.keys().map(ToString::to_string).collect();
        kinds.sort();
        f.debug_struct("ActionRegistry").field("kinds", &kinds).finish()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
