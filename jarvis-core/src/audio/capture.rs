//! Audio capture via cpal.
//!
//! Opens the default (or named) input device, captures audio at its native
//! sample rate, down-mixes to mono, resamples to 16 kHz if needed, and pushes
//! samples into a [`FrameQueue`]. [`MicCapture`] reads fixed-size frames back out
//! on the loop thread.

use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use tracing::{debug, error, info, warn};

use super::frame_queue::{frame_queue, FrameQueue, SampleSink};
use super::AudioSource;

/// Target sample rate for the processing pipeline.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// How long `read_frame` waits for samples before reporting a stalled device.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll interval while waiting for a full frame.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// List available input device names.
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.input_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

/// Resolved info about the audio input we will use.
struct CaptureConfig {
    device: cpal::Device,
    stream_config: StreamConfig,
    native_rate: u32,
}

/// Find and configure the input device.
fn resolve_device(device_name: Option<&str>) -> Result<CaptureConfig, String> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()
            .map_err(|e| format!("Failed to enumerate input devices: {e}"))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| format!("Input device not found: {name}"))?
    } else {
        host.default_input_device()
            .ok_or_else(|| "No default input device available".to_string())?
    };

    let dev_name = device.name().unwrap_or_else(|_| "unknown".into());
    debug!(device = %dev_name, "Selected input device");

    let default_config = device
        .default_input_config()
        .map_err(|e| format!("Failed to get default input config: {e}"))?;

    let native_rate = default_config.sample_rate().0;
    let channels = default_config.channels();

    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(native_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    Ok(CaptureConfig {
        device,
        stream_config,
        native_rate,
    })
}

/// Simple linear resampler from `from_rate` to `to_rate`.
/// Operates on mono f32 samples.
fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0.0);
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0);
        output.push(s0 + frac * (s1 - s0));
    }
    output
}

/// Down-mix multi-channel audio to mono by averaging channels.
fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Start audio capture. Returns the cpal `Stream` (must be kept alive).
///
/// When the queue is full new samples are dropped; the reader reports the
/// overrun on its next frame.
fn start_capture(mut sink: SampleSink, device_name: Option<&str>) -> Result<Stream, String> {
    let cfg = resolve_device(device_name)?;
    let native_rate = cfg.native_rate;
    let channels = cfg.stream_config.channels;

    let stream = cfg
        .device
        .build_input_stream(
            &cfg.stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = to_mono(data, channels);
                let resampled = resample_linear(&mono, native_rate, TARGET_SAMPLE_RATE);
                sink.push(&resampled);
            },
            move |err| {
                error!("Audio input stream error: {}", err);
            },
            None,
        )
        .map_err(|e| format!("Failed to build input stream: {e}"))?;

    stream.play().map_err(|e| format!("Failed to start input stream: {e}"))?;

    info!(
        native_rate,
        channels,
        "Audio capture started (resampling to {}Hz mono)",
        TARGET_SAMPLE_RATE,
    );

    Ok(stream)
}

/// A live microphone stream read in fixed-size frames.
///
/// The cpal stream is stopped and the device released when this drops.
/// `cpal::Stream` is `!Send` on some platforms, so a capture must be opened
/// on the thread that reads it.
pub struct MicCapture {
    _stream: Stream,
    queue: FrameQueue,
    frame_length: usize,
}

impl MicCapture {
    /// Open the input device and start streaming `frame_length`-sample frames.
    pub fn open(device_name: Option<&str>, frame_length: usize) -> anyhow::Result<Self> {
        let (sink, queue) = frame_queue();
        let stream = start_capture(sink, device_name).map_err(anyhow::Error::msg)?;
        Ok(Self {
            _stream: stream,
            queue,
            frame_length,
        })
    }
}

impl AudioSource for MicCapture {
    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn read_frame(&mut self) -> anyhow::Result<Vec<f32>> {
        let started = Instant::now();
        loop {
            if let Some(frame) = self.queue.pop_frame(self.frame_length) {
                let lost = self.queue.take_overrun();
                if lost > 0 {
                    warn!(samples = lost, "Input overrun, audio dropped");
                }
                return Ok(frame);
            }
            if started.elapsed() > STALL_TIMEOUT {
                anyhow::bail!("Audio input stalled: no samples for {:?}", STALL_TIMEOUT);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn discard_pending(&mut self) {
        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!(samples = dropped, "Discarded stale input audio");
        }
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        info!("Audio input stream released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono_averages_channels() {
        assert_eq!(to_mono(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(to_mono(&[0.25, 0.75], 1), vec![0.25, 0.75]);
    }

    #[test]
    fn test_resample_halves_length() {
        let input: Vec<f32> = (0..32).map(|i| i as f32).collect();
        let out = resample_linear(&input, 32_000, 16_000);
        assert_eq!(out.len(), 16);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 2.0);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&input, 16_000, 16_000), input);
    }
}
