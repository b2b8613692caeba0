//! The wake → record → match → dispatch loop.
//!
//! [`AssistantSession`] owns the audio source, the wake-word detector and the
//! recognizer for its whole life and drives them from a single thread. One
//! call to [`AssistantSession::step`] reads one frame and, on an accepted
//! wake, runs a complete cycle. [`AssistantSession::run`] repeats steps and
//! keeps going when one fails.

mod context;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::actions::{panic_message, Flow};
use crate::audio::{AudioSource, TARGET_SAMPLE_RATE};
use crate::stt::SpeechRecognizer;
use crate::wake_word::WakeWordDetector;

pub use context::{AssistantContext, Outcome};

/// Where the session is within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Listening,
    DebounceCheck,
    Acknowledging,
    Recording,
    Filtering,
    Matching,
    Dispatching,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Listening => "listening",
            Self::DebounceCheck => "debounce_check",
            Self::Acknowledging => "acknowledging",
            Self::Recording => "recording",
            Self::Filtering => "filtering",
            Self::Matching => "matching",
            Self::Dispatching => "dispatching",
        };
        f.write_str(name)
    }
}

/// Result of one [`AssistantSession::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// No wake word in this frame.
    Listening,
    /// Wake word inside the debounce window; ignored.
    Debounced,
    /// Woke, but the recognizer heard nothing.
    NoPhrase,
    Handled(Outcome),
}

/// Drops wake triggers that arrive too soon after the last accepted one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_trigger: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_trigger: None,
        }
    }

    /// Accept a trigger at `now` unless it is within the window of the last
    /// accepted one. Rejected triggers leave the timestamp untouched.
    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_trigger {
            if now.saturating_duration_since(last) <= self.window {
                return false;
            }
        }
        self.last_trigger = Some(now);
        true
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }
}

pub struct AssistantSession<A, D, R> {
    context: Arc<AssistantContext>,
    audio: A,
    detector: D,
    recognizer: R,
    debouncer: Debouncer,
    phase: Phase,
}

impl<A, D, R> AssistantSession<A, D, R>
where
    A: AudioSource,
    D: WakeWordDetector,
    R: SpeechRecognizer,
{
    /// Fails when the audio source does not produce the frames the detector
    /// expects.
    pub fn new(
        context: Arc<AssistantContext>,
        audio: A,
        detector: D,
        recognizer: R,
    ) -> anyhow::Result<Self> {
        if detector.sample_rate() != TARGET_SAMPLE_RATE {
            anyhow::bail!(
                "Wake-word detector expects {} Hz audio, capture runs at {} Hz",
                detector.sample_rate(),
                TARGET_SAMPLE_RATE
            );
        }
        if audio.frame_length() != detector.frame_length() {
            anyhow::bail!(
                "Audio frames are {} samples, wake-word detector expects {}",
                audio.frame_length(),
                detector.frame_length()
            );
        }

        let debouncer = Debouncer::new(context.debounce);
        Ok(Self {
            context,
            audio,
            detector,
            recognizer,
            debouncer,
            phase: Phase::Listening,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn context(&self) -> &AssistantContext {
        &self.context
    }

    /// Process one frame, and a whole cycle if it carries an accepted wake.
    ///
    /// On error the phase is left where the failure happened.
    pub fn step(&mut self) -> anyhow::Result<Step> {
        self.phase = Phase::Listening;
        let frame = self.audio.read_frame()?;
        if !self.detector.process(&frame)? {
            return Ok(Step::Listening);
        }

        self.phase = Phase::DebounceCheck;
        if !self.debouncer.accept(Instant::now()) {
            debug!("Wake word inside debounce window, ignored");
            self.phase = Phase::Listening;
            return Ok(Step::Debounced);
        }
        info!("Wake word detected");

        let result = self.cycle();
        // Audio captured while we were busy is not a new wake.
        self.audio.discard_pending();
        let step = result?;
        self.phase = Phase::Listening;
        Ok(step)
    }

    fn cycle(&mut self) -> anyhow::Result<Step> {
        self.phase = Phase::Acknowledging;
        self.context.greet();

        self.phase = Phase::Recording;
        let Some(transcript) = self.recognizer.transcribe()? else {
            info!("No phrase received");
            return Ok(Step::NoPhrase);
        };
        info!(transcript = %transcript, "Phrase received");

        self.phase = Phase::Filtering;
        let text = self.context.filter.apply(&transcript);
        if text.is_empty() {
            info!("Empty command");
            return Ok(Step::Handled(Outcome::Empty));
        }

        self.phase = Phase::Matching;
        let Some(found) = self.context.matcher.find(&text, &self.context.catalog) else {
            return Ok(Step::Handled(Outcome::NoMatch));
        };

        self.phase = Phase::Dispatching;
        let flow = self.context.registry.dispatch_chain([found.command]);
        Ok(Step::Handled(Outcome::Dispatched {
            command: found.command.label().to_string(),
            flow,
        }))
    }

    /// Step until `running` is cleared or a `terminate` action runs.
    ///
    /// A failing or panicking step is logged with its phase and the loop
    /// resumes listening.
    pub fn run(&mut self, running: &AtomicBool) {
        info!("Listening");
        while running.load(Ordering::SeqCst) {
            match catch_unwind(AssertUnwindSafe(|| self.step())) {
                Ok(Ok(Step::Handled(Outcome::Dispatched {
                    flow: Flow::Terminate,
                    ..
                }))) => {
                    info!("Terminate requested, ending session");
                    break;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!(phase = %self.phase, error = %format!("{e:#}"), "Iteration failed");
                }
                Err(panic) => {
                    error!(
                        phase = %self.phase,
                        panic = panic_message(panic.as_ref()),
                        "Iteration panicked"
                    );
                }
            }
            self.phase = Phase::Listening;
        }
        info!("Session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_trigger_is_accepted() {
        let mut debouncer = Debouncer::new(Duration::from_secs(2));
        let now = Instant::now();
        assert!(debouncer.accept(now));
        assert_eq!(debouncer.last_trigger(), Some(now));
    }

    #[test]
    fn test_trigger_inside_window_is_dropped_without_moving_timestamp() {
        let mut debouncer = Debouncer::new(Duration::from_secs(2));
        let start = Instant::now();
        assert!(debouncer.accept(start));
        assert!(!debouncer.accept(start + Duration::from_millis(1500)));
        assert!(!debouncer.accept(start + Duration::from_secs(2)));
        assert_eq!(debouncer.last_trigger(), Some(start));
    }

    #[test]
    fn test_trigger_after_window_is_accepted() {
        let mut debouncer = Debouncer::new(Duration::from_secs(2));
        let start = Instant::now();
        assert!(debouncer.accept(start));
        // 1.5 s later is dropped; 2.5 s after the first is accepted, because
        // the window counts from the last accepted trigger.
        assert!(!debouncer.accept(start + Duration::from_millis(1500)));
        let later = start + Duration::from_millis(2500);
        assert!(debouncer.accept(later));
        assert_eq!(debouncer.last_trigger(), Some(later));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::DebounceCheck.to_string(), "debounce_check");
        assert_eq!(Phase::Listening.to_string(), "listening");
    }
}
