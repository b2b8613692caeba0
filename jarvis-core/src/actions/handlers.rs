//! Built-in action handlers.

use std::path::Path;

use tracing::{error, info, warn};

use super::{ActionHandler, Flow, HandlerEnv};
use crate::audio::SoundLibrary;
use crate::commands::{Action, Command};

/// Plays one of the command's sounds.
#[derive(Debug, Clone)]
pub struct VoiceHandler {
    sounds: SoundLibrary,
}

impl VoiceHandler {
    pub fn new(sounds: SoundLibrary) -> Self {
        Self { sounds }
    }
}

impl ActionHandler for VoiceHandler {
    fn handle(&self, command: &Command) -> anyhow::Result<Flow> {
        self.sounds.play_random(command.sounds());
        Ok(Flow::Continue)
    }
}

/// Launches an executable under the application root, then plays feedback.
pub struct ExeHandler {
    env: HandlerEnv,
}

impl ExeHandler {
    pub fn new(env: HandlerEnv) -> Self {
        Self { env }
    }
}

impl ActionHandler for ExeHandler {
    fn handle(&self, command: &Command) -> anyhow::Result<Flow> {
        let Action::Exe { exe_path, exe_args } = &command.action else {
            anyhow::bail!("exe handler cannot run a {} command", command.kind());
        };

        let path = self.env.app_root.join(exe_path);
        if !path.exists() {
            error!(path = %path.display(), "Executable not found");
            return Ok(Flow::Continue);
        }

        if let Err(e) = self.env.processes.launch(&path, exe_args) {
            error!(path = %path.display(), error = %format!("{e:#}"), "execution failed");
            return Ok(Flow::Continue);
        }

        self.env.sounds.play_random(command.sounds());
        Ok(Flow::Continue)
    }
}

/// Runs a command-line program while its feedback sound plays.
///
/// Termination utilities are guarded: when the target process is not
/// running, the "nothing to close" sound plays instead and the program is
/// never invoked.
pub struct CliHandler {
    env: HandlerEnv,
}

impl CliHandler {
    pub fn new(env: HandlerEnv) -> Self {
        Self { env }
    }

    fn is_terminator(&self, program: &str) -> bool {
        let stem = Path::new(program)
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.env
            .terminate_programs
            .iter()
            .any(|p| p.to_lowercase() == stem)
    }
}

impl ActionHandler for CliHandler {
    fn handle(&self, command: &Command) -> anyhow::Result<Flow> {
        let Action::Cli { cli_cmd, cli_args } = &command.action else {
            anyhow::bail!("cli handler cannot run a {} command", command.kind());
        };

        if self.is_terminator(cli_cmd) {
            match termination_target(cli_args) {
                Some(target) if !self.env.processes.is_running(target) => {
                    info!(target, "Nothing to close, process is not running");
                    self.env.sounds.play(&self.env.not_running_sound);
                    return Ok(Flow::Continue);
                }
                Some(_) => {}
                None => warn!(program = %cli_cmd, "No termination target in arguments"),
            }
        }

        let sounds = &self.env.sounds;
        let result = std::thread::scope(|scope| {
            let feedback = scope.spawn(|| sounds.play_random(command.sounds()));
            let result = self.env.processes.run(cli_cmd, cli_args);
            if feedback.join().is_err() {
                error!("Feedback playback panicked");
            }
            result
        });

        if let Err(e) = result {
            error!(program = %cli_cmd, error = %format!("{e:#}"), "execution failed");
        }
        Ok(Flow::Continue)
    }
}

/// The process a termination utility is aimed at: the first argument
/// naming an `.exe`, else the last argument that is not a flag.
pub fn termination_target(args: &[String]) -> Option<&str> {
    args.iter()
        .find(|a| a.to_lowercase().ends_with(".exe"))
        .or_else(|| {
            args.iter()
                .rev()
                .find(|a| !a.starts_with('-') && !a.starts_with('/'))
        })
        .map(String::as_str)
}

/// `terminate` and `stop_chaining`: optional sound, then a control signal.
#[derive(Debug, Clone)]
pub struct ControlHandler {
    sounds: SoundLibrary,
    flow: Flow,
}

impl ControlHandler {
    pub fn new(sounds: SoundLibrary, flow: Flow) -> Self {
        Self { sounds, flow }
    }
}

impl ActionHandler for ControlHandler {
    fn handle(&self, command: &Command) -> anyhow::Result<Flow> {
        if !command.sounds().is_empty() {
            self.sounds.play_random(command.sounds());
        }
        info!(flow = %self.flow, "Control action");
        Ok(self.flow)
    }
}
