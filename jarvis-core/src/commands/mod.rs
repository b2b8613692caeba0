//! Declarative voice commands.
//!
//! A command pairs the phrases a user may say with one action and the
//! sounds used as spoken feedback. Commands are written in YAML:
//!
//! ```yaml
//! list:
//!   - command:
//!       action: exe
//!       exe_path: apps/notepad.exe
//!     voice:
//!       sounds: [ok1, ok2]
//!     phrases: ["открой блокнот"]
//! ```

mod catalog;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use catalog::{CatalogLoadError, CommandCatalog, CommandSource, LoadReport, RecordError};

/// What a command does once matched. Tagged by the `action` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Run a command-line program to completion.
    Cli {
        cli_cmd: String,
        #[serde(default)]
        cli_args: Vec<String>,
    },
    /// Launch an executable relative to the application root.
    Exe {
        exe_path: PathBuf,
        #[serde(default)]
        exe_args: Vec<String>,
    },
    /// Only play one of the command's sounds.
    Voice,
    /// End the assistant session.
    Terminate,
    /// Stop applying further commands of the current utterance.
    StopChaining,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Cli { .. } => ActionKind::Cli,
            Self::Exe { .. } => ActionKind::Exe,
            Self::Voice => ActionKind::Voice,
            Self::Terminate => ActionKind::Terminate,
            Self::StopChaining => ActionKind::StopChaining,
        }
    }
}

/// Tag used to look up a handler in the action registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Cli,
    Exe,
    Voice,
    Terminate,
    StopChaining,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        Self::Cli,
        Self::Exe,
        Self::Voice,
        Self::Terminate,
        Self::StopChaining,
    ];

    /// Kinds whose handlers answer with one of the command's sounds.
    pub fn expects_feedback(self) -> bool {
        matches!(self, Self::Cli | Self::Exe | Self::Voice)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Exe => write!(f, "exe"),
            Self::Voice => write!(f, "voice"),
            Self::Terminate => write!(f, "terminate"),
            Self::StopChaining => write!(f, "stop_chaining"),
        }
    }
}

/// Voice feedback attached to a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceFeedback {
    /// Logical sound names, resolved as `<sound_directory>/<name>.wav`.
    #[serde(default)]
    pub sounds: Vec<String>,
}

/// One entry of the command catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub phrases: Vec<String>,
    #[serde(rename = "command")]
    pub action: Action,
    #[serde(default)]
    pub voice: VoiceFeedback,
}

impl Command {
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn sounds(&self) -> &[String] {
        &self.voice.sounds
    }

    /// First phrase, used as a human-readable label in logs.
    pub fn label(&self) -> &str {
        self.phrases.first().map(String::as_str).unwrap_or("<no phrases>")
    }

    /// Check the invariants a loaded command must satisfy.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.phrases.iter().all(|p| p.trim().is_empty()) {
            return Err(RecordError::NoPhrases);
        }
        if let Action::Cli { cli_cmd, .. } = &self.action {
            if cli_cmd.trim().is_empty() {
                return Err(RecordError::EmptyProgram);
            }
        }
        let kind = self.kind();
        if kind.expects_feedback() && self.voice.sounds.is_empty() {
            return Err(RecordError::NoSounds(kind));
        }
        Ok(())
    }
}
