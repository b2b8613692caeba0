//! Speech-to-text.
//!
//! A [`SpeechRecognizer`] captures one utterance and turns it into text. The
//! production recognizer opens its own microphone stream per utterance,
//! records until the speaker falls silent ([`record_utterance`]) and hands
//! the samples to an [`SttEngine`].

pub mod whisper;

use tracing::{debug, info};

use crate::audio::{AudioSource, MicCapture};
use crate::config::AssistantConfig;
use crate::vad::energy;

pub use whisper::WhisperStt;

/// Captures and transcribes one utterance.
pub trait SpeechRecognizer {
    /// Block until the utterance ends or the silence timeout expires.
    /// `None` means nothing was said.
    fn transcribe(&mut self) -> anyhow::Result<Option<String>>;
}

impl<R: SpeechRecognizer + ?Sized> SpeechRecognizer for Box<R> {
    fn transcribe(&mut self) -> anyhow::Result<Option<String>> {
        (**self).transcribe()
    }
}

/// Turns 16 kHz mono samples into text.
pub trait SttEngine {
    fn transcribe(&mut self, audio: &[f32]) -> anyhow::Result<String>;
}

/// Limits for recording one utterance, all counted in frames.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSettings {
    pub frame_length: usize,
    /// Quiet frames after speech that end the utterance.
    pub max_silence_frames: usize,
    /// Quiet frames before any speech after which nothing was said.
    pub max_leading_silence_frames: usize,
    /// Hard cap on the utterance length.
    pub max_recording_frames: usize,
    pub speech_energy_threshold: f32,
}

impl RecordingSettings {
    /// 80 ms at 16 kHz.
    pub const DEFAULT_FRAME_LENGTH: usize = 1280;

    pub fn from_config(config: &AssistantConfig) -> Self {
        Self {
            frame_length: Self::DEFAULT_FRAME_LENGTH,
            max_silence_frames: config.max_silence_frames.max(1),
            max_leading_silence_frames: config.max_leading_silence_frames.max(1),
            max_recording_frames: config.max_recording_frames.max(1),
            speech_energy_threshold: config.speech_energy_threshold,
        }
    }
}

/// Record from `source` until speech ends.
///
/// Returns `None` when no speech starts within the leading-silence limit.
pub fn record_utterance<A: AudioSource + ?Sized>(
    source: &mut A,
    settings: &RecordingSettings,
) -> anyhow::Result<Option<Vec<f32>>> {
    let mut samples = Vec::new();
    let mut speaking = false;
    let mut leading = 0usize;
    let mut silent = 0usize;
    let mut frames = 0usize;

    loop {
        let frame = source.read_frame()?;
        let loud = energy::is_speech(&frame, settings.speech_energy_threshold);

        if !speaking {
            if !loud {
                leading += 1;
                if leading >= settings.max_leading_silence_frames {
                    debug!(frames = leading, "No speech before leading-silence timeout");
                    return Ok(None);
                }
                continue;
            }
            speaking = true;
        }

        samples.extend_from_slice(&frame);
        frames += 1;
        silent = if loud { 0 } else { silent + 1 };

        if silent >= settings.max_silence_frames {
            break;
        }
        if frames >= settings.max_recording_frames {
            debug!(frames, "Utterance reached maximum length");
            break;
        }
    }

    info!(
        frames,
        seconds = samples.len() as f32 / crate::audio::TARGET_SAMPLE_RATE as f32,
        "Utterance recorded"
    );
    Ok(Some(samples))
}

/// Records from the microphone and transcribes with `E`.
///
/// Every call opens a fresh input stream and releases it before
/// transcription starts.
pub struct MicRecognizer<E> {
    engine: E,
    settings: RecordingSettings,
    input_device: Option<String>,
}

impl<E: SttEngine> MicRecognizer<E> {
    pub fn new(engine: E, settings: RecordingSettings, input_device: Option<String>) -> Self {
        Self {
            engine,
            settings,
            input_device,
        }
    }
}

impl<E: SttEngine> SpeechRecognizer for MicRecognizer<E> {
    fn transcribe(&mut self) -> anyhow::Result<Option<String>> {
        let audio = {
            let mut capture =
                MicCapture::open(self.input_device.as_deref(), self.settings.frame_length)?;
            record_utterance(&mut capture, &self.settings)?
        };

        let Some(audio) = audio else {
            return Ok(None);
        };
        let text = self.engine.transcribe(&audio)?;
        Ok(non_empty(text))
    }
}

/// Trimmed text, or `None` if nothing is left.
pub fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Script {
        frames: VecDeque<Vec<f32>>,
    }

    impl Script {
        /// `true` is a loud frame, `false` a silent one.
        fn new(pattern: &[bool]) -> Self {
            let frames = pattern
                .iter()
                .map(|&loud| vec![if loud { 0.5 } else { 0.0 }; 4])
                .collect();
            Self { frames }
        }
    }

    impl AudioSource for Script {
        fn frame_length(&self) -> usize {
            4
        }

        fn read_frame(&mut self) -> anyhow::Result<Vec<f32>> {
            self.frames
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }
    }

    fn settings() -> RecordingSettings {
        RecordingSettings {
            frame_length: 4,
            max_silence_frames: 2,
            max_leading_silence_frames: 3,
            max_recording_frames: 6,
            speech_energy_threshold: 0.1,
        }
    }

    #[test]
    fn test_records_until_trailing_silence() {
        let mut source = Script::new(&[false, true, true, false, false, true]);
        let audio = record_utterance(&mut source, &settings()).unwrap().unwrap();
        // two loud frames plus the two silent frames that ended it
        assert_eq!(audio.len(), 16);
        assert_eq!(source.frames.len(), 1);
    }

    #[test]
    fn test_leading_silence_means_nothing_said() {
        let mut source = Script::new(&[false, false, false, true]);
        assert!(record_utterance(&mut source, &settings()).unwrap().is_none());
    }

    #[test]
    fn test_utterance_is_capped() {
        let mut source = Script::new(&[true; 10]);
        let audio = record_utterance(&mut source, &settings()).unwrap().unwrap();
        assert_eq!(audio.len(), 6 * 4);
    }

    #[test]
    fn test_read_error_propagates() {
        let mut source = Script::new(&[true]);
        assert!(record_utterance(&mut source, &settings()).is_err());
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty("  открой  ".into()), Some("открой".into()));
        assert_eq!(non_empty("   ".into()), None);
    }
}
