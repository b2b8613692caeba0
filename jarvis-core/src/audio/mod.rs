//! Audio capture, frame queue and WAV playback.

pub mod capture;
pub mod frame_queue;
pub mod playback;

pub use capture::{list_devices, MicCapture, TARGET_SAMPLE_RATE};
pub use playback::{play_random_from_dir, RodioPlayer, SoundLibrary, SoundPlayer};

/// A blocking source of fixed-size mono frames at 16 kHz.
pub trait AudioSource {
    /// Samples returned by each [`read_frame`](Self::read_frame) call.
    fn frame_length(&self) -> usize;

    /// Block until the next frame is available.
    fn read_frame(&mut self) -> anyhow::Result<Vec<f32>>;

    /// Drop any audio buffered since the last read.
    fn discard_pending(&mut self) {}
}

impl<A: AudioSource + ?Sized> AudioSource for Box<A> {
    fn frame_length(&self) -> usize {
        (**self).frame_length()
    }

    fn read_frame(&mut self) -> anyhow::Result<Vec<f32>> {
        (**self).read_frame()
    }

    fn discard_pending(&mut self) {
        (**self).discard_pending()
    }
}
