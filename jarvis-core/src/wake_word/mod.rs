//! Wake-word detection.

pub mod oww;

pub use oww::OpenWakeWord;

/// Reports whether the wake word ends in a frame of audio.
pub trait WakeWordDetector {
    /// Samples per frame the detector expects.
    fn frame_length(&self) -> usize;

    /// Sample rate the detector expects, in Hz.
    fn sample_rate(&self) -> u32;

    fn process(&mut self, frame: &[f32]) -> anyhow::Result<bool>;
}

impl<D: WakeWordDetector + ?Sized> WakeWordDetector for Box<D> {
    fn frame_length(&self) -> usize {
        (**self).frame_length()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn process(&mut self, frame: &[f32]) -> anyhow::Result<bool> {
        (**self).process(frame)
    }
}
