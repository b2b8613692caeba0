//! OpenWakeWord 3-stage ONNX detection pipeline.
//!
//! Pipeline stages:
//!   1. `melspectrogram.onnx`: audio (1280 samples) -> mel spectrogram features
//!   2. `embedding_model.onnx`: mel features -> embeddings
//!   3. keyword model (`keywords_path`): accumulated embeddings -> wake score
//!
//! The mel and embedding models are looked up next to the keyword model.
//! Without the `onnx` feature, loading fails with a clear error.

use std::path::{Path, PathBuf};

use super::WakeWordDetector;
use crate::audio::TARGET_SAMPLE_RATE;

/// Chunk size in samples (80 ms at 16 kHz).
pub const CHUNK_SAMPLES: usize = 1280;

const MEL_MODEL: &str = "melspectrogram.onnx";
const EMBEDDING_MODEL: &str = "embedding_model.onnx";

/// Model files the pipeline needs for a given keyword model.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
fn model_paths(keyword_model: &Path) -> [(&'static str, PathBuf); 3] {
    let dir = keyword_model.parent().unwrap_or_else(|| Path::new("."));
    [
        ("melspectrogram", dir.join(MEL_MODEL)),
        ("embedding", dir.join(EMBEDDING_MODEL)),
        ("keyword", keyword_model.to_path_buf()),
    ]
}

#[cfg(feature = "onnx")]
mod inner {
    use super::*;
    use anyhow::Context;
    use ort::session::Session;
    use tracing::{debug, info, warn};

    /// Embedding window the keyword classifier scores over.
    const EMBEDDING_WINDOW: usize = 16;

    pub struct OpenWakeWord {
        mel_session: Session,
        embed_session: Session,
        ww_session: Session,
        threshold: f32,
        /// Audio sample accumulation buffer.
        buffer: Vec<f32>,
        /// Most recent embeddings, oldest first.
        embeddings: Vec<Vec<f32>>,
    }

    impl OpenWakeWord {
        pub fn load(keyword_model: &Path, threshold: f32) -> anyhow::Result<Self> {
            let [mel, embed, ww] = model_paths(keyword_model);
            for (name, path) in [&mel, &embed, &ww] {
                if !path.exists() {
                    anyhow::bail!("OpenWakeWord {} model not found: {}", name, path.display());
                }
            }

            let load = |path: &Path| -> anyhow::Result<Session> {
                Session::builder()
                    .and_then(|b| b.with_intra_threads(1))
                    .and_then(|b| b.with_inter_threads(1))
                    .and_then(|b| b.commit_from_file(path))
                    .map_err(|e| anyhow::anyhow!("{e}"))
                    .with_context(|| format!("Failed to load {}", path.display()))
            };

            let detector = Self {
                mel_session: load(&mel.1)?,
                embed_session: load(&embed.1)?,
                ww_session: load(&ww.1)?,
                threshold,
                buffer: Vec::new(),
                embeddings: Vec::new(),
            };
            info!(
                keyword = %keyword_model.display(),
                threshold,
                "OpenWakeWord loaded (3-stage pipeline)"
            );
            Ok(detector)
        }

        pub fn reset(&mut self) {
            self.buffer.clear();
            self.embeddings.clear();
        }

        /// Run the pipeline on one 1280-sample chunk, returning the wake score.
        fn run_pipeline(&mut self, chunk: &[f32]) -> Result<f32, String> {
            // Stage 1: audio -> mel spectrogram
            let audio_input =
                ort::value::Value::from_array(([1, CHUNK_SAMPLES], chunk.to_vec()))
                    .map_err(|e| format!("mel input value: {e}"))?;
            let mel_outputs = self
                .mel_session
                .run(ort::inputs!["input" => audio_input])
                .map_err(|e| format!("mel inference: {e}"))?;

            // Stage 2: mel features -> embedding
            let (mel_shape, mel_data) = mel_outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| format!("extract mel output: {e}"))?;
            let mel_dims: Vec<usize> = mel_shape.iter().map(|&d| d as usize).collect();
            let embed_input = ort::value::Value::from_array((mel_dims, mel_data.to_vec()))
                .map_err(|e| format!("embed input value: {e}"))?;
            let embed_outputs = self
                .embed_session
                .run(ort::inputs!["input" => embed_input])
                .map_err(|e| format!("embed inference: {e}"))?;
            let (_shape, embed_data) = embed_outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| format!("extract embedding: {e}"))?;

            self.embeddings.push(embed_data.to_vec());
            if self.embeddings.len() > EMBEDDING_WINDOW {
                self.embeddings.drain(..self.embeddings.len() - EMBEDDING_WINDOW);
            }
            if self.embeddings.len() < EMBEDDING_WINDOW {
                return Ok(0.0);
            }

            // Stage 3: accumulated embeddings -> wake score
            let embed_dim = self.embeddings[0].len();
            let flat: Vec<f32> = self.embeddings.iter().flatten().copied().collect();
            let ww_input =
                ort::value::Value::from_array(([1, EMBEDDING_WINDOW, embed_dim], flat))
                    .map_err(|e| format!("ww input value: {e}"))?;
            let ww_outputs = self
                .ww_session
                .run(ort::inputs!["input" => ww_input])
                .map_err(|e| format!("ww inference: {e}"))?;
            let (_shape, data) = ww_outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| format!("extract ww score: {e}"))?;
            data.first().copied().ok_or_else(|| "empty ww output".to_string())
        }
    }

    impl WakeWordDetector for OpenWakeWord {
        fn frame_length(&self) -> usize {
            CHUNK_SAMPLES
        }

        fn sample_rate(&self) -> u32 {
            TARGET_SAMPLE_RATE
        }

        fn process(&mut self, frame: &[f32]) -> anyhow::Result<bool> {
            self.buffer.extend_from_slice(frame);

            let mut max_score: f32 = 0.0;
            while self.buffer.len() >= CHUNK_SAMPLES {
                let chunk: Vec<f32> = self.buffer.drain(..CHUNK_SAMPLES).collect();
                match self.run_pipeline(&chunk) {
                    Ok(score) => max_score = max_score.max(score),
                    // A bad chunk is skipped; the stream continues.
                    Err(e) => warn!("OpenWakeWord pipeline error: {e}"),
                }
            }

            let detected = max_score >= self.threshold;
            if detected {
                debug!(score = max_score, "Wake word detected");
                self.reset();
            }
            Ok(detected)
        }
    }

    impl Drop for OpenWakeWord {
        fn drop(&mut self) {
            info!("Wake-word engine released");
        }
    }
}

#[cfg(not(feature = "onnx"))]
mod inner {
    use super::*;
    use tracing::warn;

    /// Placeholder used when the crate is built without `onnx`.
    pub struct OpenWakeWord {
        _private: (),
    }

    impl OpenWakeWord {
        pub fn load(keyword_model: &Path, _threshold: f32) -> anyhow::Result<Self> {
            warn!(
                keyword = %keyword_model.display(),
                "Wake-word detection requested but onnx feature is disabled"
            );
            anyhow::bail!("Wake-word detection is not available (compile with --features onnx)")
        }

        pub fn reset(&mut self) {}
    }

    impl WakeWordDetector for OpenWakeWord {
        fn frame_length(&self) -> usize {
            CHUNK_SAMPLES
        }

        fn sample_rate(&self) -> u32 {
            TARGET_SAMPLE_RATE
        }

        fn process(&mut self, _frame: &[f32]) -> anyhow::Result<bool> {
            Ok(false)
        }
    }
}

pub use inner::OpenWakeWord;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_support_models_live_next_to_keyword_model() {
        let [mel, embed, keyword] = model_paths(Path::new("/models/jarvis.onnx"));
        assert_eq!(mel.1, PathBuf::from("/models/melspectrogram.onnx"));
        assert_eq!(embed.1, PathBuf::from("/models/embedding_model.onnx"));
        assert_eq!(keyword.1, PathBuf::from("/models/jarvis.onnx"));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_load_without_onnx_is_error() {
        assert!(OpenWakeWord::load(Path::new("/models/jarvis.onnx"), 0.5).is_err());
    }
}
