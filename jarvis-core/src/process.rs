//! Launching programs and inspecting the OS process table.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context;
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, error, info};

/// Process operations used by action handlers.
pub trait ProcessControl: Send + Sync {
    /// Run `program` to completion. A non-zero exit is an error.
    fn run(&self, program: &str, args: &[String]) -> anyhow::Result<()>;

    /// Start `program` without waiting for it.
    fn launch(&self, program: &Path, args: &[String]) -> anyhow::Result<()>;

    /// Whether a process called `name` is running (case-insensitive).
    fn is_running(&self, name: &str) -> bool;
}

/// The real process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn run(&self, program: &str, args: &[String]) -> anyhow::Result<()> {
        info!(program, ?args, "Running command");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run {program}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{program} exited with {}: {}", output.status, stderr.trim());
        }
        Ok(())
    }

    fn launch(&self, program: &Path, args: &[String]) -> anyhow::Result<()> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch {}", program.display()))?;
        info!(program = %program.display(), pid = child.id(), "Process launched");

        // Reap the child so it never lingers as a zombie.
        let label = program.display().to_string();
        std::thread::Builder::new()
            .name("jarvis-reaper".into())
            .spawn(move || match child.wait() {
                Ok(status) if status.success() => debug!(program = %label, "Process exited"),
                Ok(status) => error!(program = %label, %status, "execution failed"),
                Err(e) => error!(program = %label, error = %e, "execution failed"),
            })
            .context("Failed to spawn reaper thread")?;
        Ok(())
    }

    fn is_running(&self, name: &str) -> bool {
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);
        let running = sys
            .processes()
            .values()
            .any(|p| same_process_name(&p.name().to_string_lossy(), name));
        debug!(name, running, "Process lookup");
        running
    }
}

/// Case-insensitive name comparison that also ignores a trailing `.exe`,
/// so `chrome.exe` finds `chrome` on Unix and vice versa.
pub fn same_process_name(actual: &str, wanted: &str) -> bool {
    let actual = actual.to_lowercase();
    let wanted = wanted.to_lowercase();
    actual == wanted || strip_exe(&actual) == strip_exe(&wanted)
}

fn strip_exe(name: &str) -> &str {
    name.strip_suffix(".exe").unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_process_name() {
        assert!(same_process_name("chrome.exe", "CHROME.EXE"));
        assert!(same_process_name("chrome", "chrome.exe"));
        assert!(same_process_name("Chrome.exe", "chrome"));
        assert!(!same_process_name("chromedriver", "chrome.exe"));
    }

    #[test]
    fn test_unknown_process_is_not_running() {
        assert!(!SystemProcesses.is_running("no-such-process-jarvis-test"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_non_zero_exit() {
        assert!(SystemProcesses.run("true", &[]).is_ok());
        assert!(SystemProcesses.run("false", &[]).is_err());
    }

    #[test]
    fn test_launch_missing_program_is_error() {
        assert!(SystemProcesses
            .launch(Path::new("/definitely/not/here"), &[])
            .is_err());
    }
}
