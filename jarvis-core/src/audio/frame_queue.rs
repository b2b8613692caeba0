//! Sample queue between the cpal callback and the loop thread.
//!
//! The callback pushes resampled mono samples; the reader takes them back out
//! in whole frames. When the queue is full the newest samples are dropped and
//! counted so the reader can report the overrun.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::TARGET_SAMPLE_RATE;

/// Seconds of 16 kHz audio held before samples start being dropped.
const CAPACITY_SECS: usize = 10;

/// Writing half, moved into the input callback.
pub struct SampleSink {
    inner: HeapProd<f32>,
    overrun: Arc<AtomicUsize>,
}

/// Reading half, owned by [`MicCapture`](super::MicCapture).
pub struct FrameQueue {
    inner: HeapCons<f32>,
    overrun: Arc<AtomicUsize>,
}

/// A queue sized for [`CAPACITY_SECS`] of audio.
pub fn frame_queue() -> (SampleSink, FrameQueue) {
    frame_queue_with_capacity(CAPACITY_SECS * TARGET_SAMPLE_RATE as usize)
}

pub fn frame_queue_with_capacity(capacity: usize) -> (SampleSink, FrameQueue) {
    let (prod, cons) = HeapRb::<f32>::new(capacity).split();
    let overrun = Arc::new(AtomicUsize::new(0));
    (
        SampleSink {
            inner: prod,
            overrun: Arc::clone(&overrun),
        },
        FrameQueue {
            inner: cons,
            overrun,
        },
    )
}

impl SampleSink {
    /// Queue `samples`, dropping whatever does not fit.
    pub fn push(&mut self, samples: &[f32]) {
        let written = self.inner.push_slice(samples);
        if written < samples.len() {
            self.overrun
                .fetch_add(samples.len() - written, Ordering::Relaxed);
        }
    }
}

impl FrameQueue {
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Take the next `len` samples, or `None` while fewer are queued.
    pub fn pop_frame(&mut self, len: usize) -> Option<Vec<f32>> {
        if self.available() < len {
            return None;
        }
        let mut frame = vec![0.0f32; len];
        let read = self.inner.pop_slice(&mut frame);
        frame.truncate(read);
        Some(frame)
    }

    /// Drop everything queued and any pending overrun count. Returns the
    /// number of samples dropped.
    pub fn clear(&mut self) -> usize {
        self.overrun.store(0, Ordering::Relaxed);
        self.inner.clear()
    }

    /// Samples lost to a full queue since the last call.
    pub fn take_overrun(&self) -> usize {
        self.overrun.swap(0, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_come_out_whole_and_in_order() {
        let (mut sink, mut queue) = frame_queue_with_capacity(8);
        sink.push(&[0.1, 0.2, 0.3]);

        assert_eq!(queue.pop_frame(4), None);
        assert_eq!(queue.pop_frame(2), Some(vec![0.1, 0.2]));
        assert_eq!(queue.available(), 1);
    }

    #[test]
    fn test_full_queue_counts_dropped_samples() {
        let (mut sink, mut queue) = frame_queue_with_capacity(4);
        sink.push(&[1.0; 6]);

        assert_eq!(queue.take_overrun(), 2);
        assert_eq!(queue.take_overrun(), 0);
        assert_eq!(queue.pop_frame(4), Some(vec![1.0; 4]));
    }

    #[test]
    fn test_clear_drops_queued_audio_and_overrun() {
        let (mut sink, mut queue) = frame_queue_with_capacity(4);
        sink.push(&[0.5; 5]);

        assert_eq!(queue.clear(), 4);
        assert_eq!(queue.available(), 0);
        assert_eq!(queue.take_overrun(), 0);
    }

    #[test]
    fn test_default_queue_holds_ten_seconds() {
        let (mut sink, queue) = frame_queue();
        sink.push(&vec![0.0; 16_000 * 10 + 1]);
        assert_eq!(queue.available(), 160_000);
        assert_eq!(queue.take_overrun(), 1);
    }
}
