//! Local whisper.cpp STT via whisper-rs.
//!
//! The real implementation is gated behind `#[cfg(feature = "whisper")]`.
//! When the feature is disabled, a stub is provided that fails to load.

// ── whisper enabled ────────────────────────────────────────────────
#[cfg(feature = "whisper")]
mod inner {
    use std::path::Path;

    use tracing::{debug, info};
    use whisper_rs::{
        FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
    };

    use crate::stt::SttEngine;

    /// Minimum audio duration in samples at 16 kHz (0.4 s = 6400 samples).
    const MIN_SAMPLES: usize = 6_400;

    /// Half the available cores, capped 1..=8.
    fn inference_threads() -> i32 {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (cores / 2).clamp(1, 8) as i32
    }

    pub struct WhisperStt {
        ctx: WhisperContext,
        /// Created on first use and reused; creating a state is expensive.
        state: Option<WhisperState>,
        language: String,
        n_threads: i32,
    }

    impl WhisperStt {
        /// Load a GGML whisper model from disk.
        pub fn new(model_path: &Path, language: &str) -> anyhow::Result<Self> {
            if !model_path.exists() {
                anyhow::bail!("Whisper model not found: {}", model_path.display());
            }
            let path = model_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Model path is not valid UTF-8"))?;
            let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
                .map_err(|e| anyhow::anyhow!("Failed to load whisper model: {}", e))?;

            let n_threads = inference_threads();
            info!(
                model = %model_path.display(),
                language,
                threads = n_threads,
                "Whisper model loaded"
            );
            Ok(Self {
                ctx,
                state: None,
                language: language.to_string(),
                n_threads,
            })
        }
    }

    impl SttEngine for WhisperStt {
        fn transcribe(&mut self, audio: &[f32]) -> anyhow::Result<String> {
            if audio.len() < MIN_SAMPLES {
                debug!(samples = audio.len(), "Utterance too short to transcribe");
                return Ok(String::new());
            }

            if self.state.is_none() {
                info!("Creating whisper state (first transcription)");
                let state = self
                    .ctx
                    .create_state()
                    .map_err(|e| anyhow::anyhow!("Failed to create whisper state: {}", e))?;
                self.state = Some(state);
            }
            let state = self
                .state
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!("Whisper state unavailable"))?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_language(Some(&self.language));
            params.set_n_threads(self.n_threads);
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            params.set_single_segment(true);
            params.set_no_timestamps(true);
            // Suppress non-speech tokens (reduces hallucination on silence)
            params.set_suppress_non_speech_tokens(true);

            state
                .full(params, audio)
                .map_err(|e| anyhow::anyhow!("Whisper inference failed: {}", e))?;

            let num_segments = state
                .full_n_segments()
                .map_err(|e| anyhow::anyhow!("Failed to get segment count: {}", e))?;
            let mut segments = Vec::new();
            for i in 0..num_segments {
                if let Ok(seg) = state.full_get_segment_text(i) {
                    segments.push(seg.trim().to_string());
                }
            }

            Ok(segments.join(" "))
        }
    }
}

// ── whisper disabled (stub) ────────────────────────────────────────
#[cfg(not(feature = "whisper"))]
mod inner {
    use std::path::Path;

    use tracing::warn;

    use crate::stt::SttEngine;

    pub struct WhisperStt;

    impl WhisperStt {
        pub fn new(model_path: &Path, _language: &str) -> anyhow::Result<Self> {
            warn!(
                model = %model_path.display(),
                "Whisper STT requested but whisper feature is disabled"
            );
            anyhow::bail!("Local whisper STT is not available (compile with --features whisper)")
        }
    }

    impl SttEngine for WhisperStt {
        fn transcribe(&mut self, _audio: &[f32]) -> anyhow::Result<String> {
            anyhow::bail!("Local whisper STT is not available (compile with --features whisper)")
        }
    }
}

pub use inner::WhisperStt;
