//! Typed-utterance loop for trying commands without a microphone.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context;

use crate::actions::Flow;
use crate::session::{AssistantContext, Outcome};

const PROMPT: &str = "> ";

/// Read utterances line by line from `input` and handle each one like a
/// transcript. Stops on end of input, `exit`, or a `terminate` action.
pub fn run<I, O>(context: &AssistantContext, input: I, mut output: O) -> anyhow::Result<()>
where
    I: BufRead,
    O: Write,
{
    write!(output, "{PROMPT}")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        let utterance = line.trim();

        if utterance.eq_ignore_ascii_case("exit") {
            break;
        }
        if !utterance.is_empty() {
            match context.handle_text(utterance) {
                Outcome::Empty => writeln!(output, "(empty command)")?,
                Outcome::NoMatch => writeln!(output, "Command not found")?,
                Outcome::Dispatched { command, flow } => {
                    writeln!(output, "-> {command}")?;
                    if flow == Flow::Terminate {
                        break;
                    }
                }
            }
        }

        write!(output, "{PROMPT}")?;
        output.flush()?;
    }

    Ok(())
}

/// [`run`] on a blocking thread, so waiting for input never holds a runtime
/// worker.
pub async fn run_blocking<I, O>(
    context: Arc<AssistantContext>,
    input: I,
    output: O,
) -> anyhow::Result<()>
where
    I: BufRead + Send + 'static,
    O: Write + Send + 'static,
{
    tokio::task::spawn_blocking(move || run(&context, input, output))
        .await
        .context("REPL panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SoundPlayer;
    use crate::commands::{CommandCatalog, CommandSource};
    use crate::config::AssistantConfig;
    use crate::process::ProcessControl;
    use std::path::Path;
    use std::sync::Mutex;

    struct Silent;

    impl SoundPlayer for Silent {
        fn play_file(&self, _path: &Path) -> anyhow::Result<()> {
            Ok(())
        }
    }

    impl ProcessControl for Silent {
        fn run(&self, _program: &str, _args: &[String]) -> anyhow::Result<()> {
            Ok(())
        }
        fn launch(&self, _program: &Path, _args: &[String]) -> anyhow::Result<()> {
            Ok(())
        }
        fn is_running(&self, _name: &str) -> bool {
            false
        }
    }

    fn context() -> AssistantContext {
        let config = AssistantConfig::from_json(
            r#"{
                "recognizer_model_path": "m.bin",
                "hello_phrases_path": "hello",
                "keywords_path": "k.onnx",
                "assistant_tbr_phrases": ["джарвис"],
                "commands_path": "commands",
                "sound_directory": "sounds"
            }"#,
            Path::new("/tmp/jarvis-repl-test"),
        )
        .unwrap();
        let catalog = CommandCatalog::from_sources([CommandSource::new(
            "test",
            r#"
list:
  - command: {action: voice}
    voice: {sounds: [hi]}
    phrases: ["привет"]
  - command: {action: terminate}
    phrases: ["выключись"]
"#,
        )]);
        AssistantContext::new(&config, catalog, Arc::new(Silent), Arc::new(Silent)).unwrap()
    }

    fn transcript(input: &str) -> String {
        let mut out = Vec::new();
        run(&context(), input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_repl_reports_each_outcome() {
        let out = transcript("джарвис привет\nбла бла\nджарвис\n");
        assert!(out.contains("-> привет"));
        assert!(out.contains("Command not found"));
        assert!(out.contains("(empty command)"));
    }

    #[test]
    fn test_repl_exit_stops_reading() {
        let out = transcript("exit\nпривет\n");
        assert!(!out.contains("-> привет"));
    }

    #[test]
    fn test_repl_terminate_action_stops_reading() {
        let out = transcript("выключись\nпривет\n");
        assert!(out.contains("-> выключись"));
        assert!(!out.contains("-> привет"));
    }

    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_blocking_handles_input_off_the_runtime() {
        let output = SharedOutput::default();
        let input = "джарвис привет\nexit\n".as_bytes();
        run_blocking(Arc::new(context()), input, output.clone())
            .await
            .unwrap();

        let out = String::from_utf8(output.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("-> привет"));
    }
}
