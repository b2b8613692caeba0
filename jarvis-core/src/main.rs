use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use jarvis_core::audio::{MicCapture, RodioPlayer};
use jarvis_core::config::{self, paths, AssistantConfig};
use jarvis_core::process::SystemProcesses;
use jarvis_core::stt::{MicRecognizer, RecordingSettings, WhisperStt};
use jarvis_core::wake_word::{OpenWakeWord, WakeWordDetector};
use jarvis_core::{logger, repl, AssistantContext, AssistantSession};

#[derive(Parser)]
#[command(name = "jarvis")]
#[command(about = "Wake-word voice assistant that runs declarative commands")]
#[command(version)]
struct Cli {
    /// Path to config.json (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for the wake word and run spoken commands (default)
    Listen,

    /// Type utterances instead of speaking them
    Repl,

    /// List the loaded commands
    Commands,

    /// Show which command a phrase would run, without running it
    Match {
        /// The phrase, as it would be transcribed
        #[arg(required = true)]
        phrase: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(paths::default_config_path);
    let config = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("jarvis: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| config.log_dir.clone())
        .unwrap_or_else(paths::default_log_dir);
    if let Err(e) = logger::init(&log_dir) {
        eprintln!("jarvis: {e:#}");
    }
    info!(config = %config_path.display(), "Configuration loaded");

    match run(cli.command.unwrap_or(Commands::Listen), config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Fatal error");
            eprintln!("jarvis: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: AssistantConfig) -> anyhow::Result<()> {
    let player = Arc::new(RodioPlayer::new(config.output_device.clone(), config.volume));
    let context = Arc::new(AssistantContext::load(&config, player, Arc::new(SystemProcesses))?);

    match command {
        Commands::Listen => listen(config, context).await,
        Commands::Repl => {
            let stdin = std::io::BufReader::new(std::io::stdin());
            repl::run_blocking(context, stdin, std::io::stdout()).await
        }
        Commands::Commands => {
            for (i, command) in context.catalog.iter().enumerate() {
                println!("{:>3}. [{}] {}", i + 1, command.kind(), command.phrases.join(" | "));
            }
            let report = context.catalog.report();
            println!("{} commands loaded, {} skipped", report.loaded, report.skipped);
            Ok(())
        }
        Commands::Match { phrase } => {
            let utterance = context.filter.apply(&phrase.join(" "));
            match context.matcher.find(&utterance, &context.catalog) {
                Some(found) => println!(
                    "{} [{}] via \"{}\": fuzzy {} x jaccard {:.2} = {:.1}",
                    found.command.label(),
                    found.command.kind(),
                    found.phrase,
                    found.similarity.fuzzy,
                    found.similarity.jaccard,
                    found.score()
                ),
                None => println!("Command not found"),
            }
            Ok(())
        }
    }
}

/// Run the voice loop on a blocking thread until Ctrl-C or a `terminate`
/// command.
async fn listen(config: AssistantConfig, context: Arc<AssistantContext>) -> anyhow::Result<()> {
    config.ensure_models()?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);

    // Audio streams are not Send on every platform, so everything that owns
    // one is created on the loop thread.
    let mut worker = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let detector = OpenWakeWord::load(&config.keywords_path, config.wake_word_threshold)?;
        let engine = WhisperStt::new(&config.recognizer_model_path, &config.language)?;
        let recognizer = MicRecognizer::new(
            engine,
            RecordingSettings::from_config(&config),
            config.input_device.clone(),
        );
        let audio = MicCapture::open(config.input_device.as_deref(), detector.frame_length())
            .context("Failed to open microphone")?;

        let mut session = AssistantSession::new(context, audio, detector, recognizer)?;
        session.run(&flag);
        Ok(())
    });

    tokio::select! {
        result = &mut worker => result.context("Voice loop panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            running.store(false, Ordering::SeqCst);
            worker.await.context("Voice loop panicked")?
        }
    }
}
