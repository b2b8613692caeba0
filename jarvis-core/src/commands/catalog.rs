//! Loading the command catalog from `command.yaml` files.
//!
//! Every `command.yaml` below the commands root contributes the records
//! under its top-level `list` key. Validation is per record: a bad record is
//! logged and skipped, a bad file or unreadable directory is logged and
//! skipped, and only a missing root is an error.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{ActionKind, Command};

/// File name the loader looks for under the commands root.
pub const SOURCE_FILE_NAME: &str = "command.yaml";

/// Top-level key holding the record list.
const LIST_KEY: &str = "list";

/// Failure to load the catalog as a whole.
#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("commands directory not found: {}", .0.display())]
    RootNotFound(PathBuf),
}

/// Why a single record was skipped.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_yaml::Error),

    #[error("record has no phrases")]
    NoPhrases,

    #[error("cli action has an empty program name")]
    EmptyProgram,

    #[error("`{0}` action requires at least one sound")]
    NoSounds(ActionKind),
}

/// One YAML document and where it came from.
#[derive(Debug, Clone)]
pub struct CommandSource {
    pub origin: String,
    pub text: String,
}

impl CommandSource {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }
}

/// Counters reported after a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
    pub failed_sources: usize,
}

/// Immutable, insertion-ordered set of commands.
#[derive(Debug, Clone, Default)]
pub struct CommandCatalog {
    commands: Vec<Command>,
    report: LoadReport,
}

impl CommandCatalog {
    /// Discover and load every `command.yaml` below `root`.
    ///
    /// Files are visited in path order so catalog order (and therefore
    /// match tie-breaking) does not depend on the filesystem.
    pub fn load(root: &Path) -> Result<Self, CatalogLoadError> {
        if !root.is_dir() {
            return Err(CatalogLoadError::RootNotFound(root.to_path_buf()));
        }

        let mut sources = Vec::new();
        let mut unreadable = 0;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    warn!(path = %path, error = %e, "Skipping unreadable commands entry");
                    unreadable += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.file_name() != SOURCE_FILE_NAME {
                continue;
            }
            let path = entry.path();
            match std::fs::read_to_string(path) {
                Ok(text) => sources.push(CommandSource::new(path.display().to_string(), text)),
                Err(e) => {
                    warn!(source = %path.display(), error = %e, "Failed to read command source");
                    unreadable += 1;
                }
            }
        }

        debug!(root = %root.display(), files = sources.len(), "Discovered command sources");

        let mut catalog = Self::from_sources(sources);
        catalog.report.failed_sources += unreadable;
        Ok(catalog)
    }

    /// Build a catalog from in-memory YAML documents.
    pub fn from_sources(sources: impl IntoIterator<Item = CommandSource>) -> Self {
        let mut commands = Vec::new();
        let mut report = LoadReport::default();

        for source in sources {
            let records = match parse_records(&source.text) {
                Ok(records) => records,
                Err(reason) => {
                    warn!(source = %source.origin, %reason, "Skipping command source");
                    report.failed_sources += 1;
                    continue;
                }
            };

            for (index, record) in records.into_iter().enumerate() {
                match parse_command(record) {
                    Ok(command) => commands.push(command),
                    Err(e) => {
                        warn!(
                            source = %source.origin,
                            index,
                            error = %e,
                            "Skipping invalid command record"
                        );
                        report.skipped += 1;
                    }
                }
            }
        }

        report.loaded = commands.len();
        info!(
            "{} commands loaded, {} skipped",
            report.loaded, report.skipped
        );

        Self { commands, report }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn report(&self) -> LoadReport {
        self.report
    }
}

impl<'a> IntoIterator for &'a CommandCatalog {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Split a document into its raw records.
fn parse_records(text: &str) -> Result<Vec<serde_yaml::Value>, String> {
    let doc: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
    match doc.get(LIST_KEY) {
        Some(serde_yaml::Value::Sequence(records)) => Ok(records.clone()),
        Some(_) => Err(format!("`{LIST_KEY}` is not a sequence")),
        None => Err(format!("missing top-level `{LIST_KEY}` key")),
    }
}

fn parse_command(record: serde_yaml::Value) -> Result<Command, RecordError> {
    let command: Command = serde_yaml::from_value(record)?;
    command.validate()?;
    Ok(command)
}
