//! Configuration reading and data directory paths.
//!
//! The assistant is configured by a single JSON document. Required keys are
//! checked up front so that every missing key is reported in one error;
//! everything else falls back to a default. Relative paths are resolved
//! against the directory that holds the config file.

pub mod paths;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::matching::Thresholds;

/// Keys that must be present in `config.json`.
pub const REQUIRED_KEYS: [&str; 6] = [
    "recognizer_model_path",
    "hello_phrases_path",
    "keywords_path",
    "assistant_tbr_phrases",
    "commands_path",
    "sound_directory",
];

/// Fatal configuration problems. Any of these aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing required key(s): {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("{what} not found: {}", path.display())]
    ModelNotFound { what: &'static str, path: PathBuf },

    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Top-level `config.json` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// whisper.cpp GGML model file.
    pub recognizer_model_path: PathBuf,
    /// Directory of greeting WAVs played on wake.
    pub hello_phrases_path: PathBuf,
    /// Wake-word classifier model. The mel-spectrogram and embedding models
    /// are expected next to it.
    pub keywords_path: PathBuf,
    /// Boilerplate stripped from transcripts (assistant name, filler words).
    pub assistant_tbr_phrases: Vec<String>,
    /// Root directory scanned for `command.yaml` files.
    pub commands_path: PathBuf,
    /// Directory that logical sound names resolve against.
    pub sound_directory: PathBuf,

    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_wake_word_threshold")]
    pub wake_word_threshold: f32,
    #[serde(default)]
    pub input_device: Option<String>,
    #[serde(default)]
    pub output_device: Option<String>,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: f64,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_jaccard_threshold")]
    pub jaccard_threshold: f64,
    #[serde(default = "default_max_silence_frames")]
    pub max_silence_frames: usize,
    #[serde(default = "default_max_leading_silence_frames")]
    pub max_leading_silence_frames: usize,
    #[serde(default = "default_max_recording_frames")]
    pub max_recording_frames: usize,
    #[serde(default = "default_speech_energy_threshold")]
    pub speech_energy_threshold: f32,
    /// Root that `exe` command paths are relative to. Defaults to the
    /// config file's directory.
    #[serde(default)]
    pub app_root: PathBuf,
    #[serde(default = "default_not_running_sound")]
    pub not_running_sound: String,
    #[serde(default = "default_terminate_programs")]
    pub terminate_programs: Vec<String>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_language() -> String {
    "ru".into()
}
fn default_wake_word_threshold() -> f32 {
    0.5
}
fn default_volume() -> f32 {
    1.0
}
fn default_debounce_secs() -> f64 {
    2.0
}
fn default_fuzzy_threshold() -> f64 {
    70.0
}
fn default_jaccard_threshold() -> f64 {
    0.3
}
fn default_max_silence_frames() -> usize {
    10
}
fn default_max_leading_silence_frames() -> usize {
    60
}
fn default_max_recording_frames() -> usize {
    150
}
fn default_speech_energy_threshold() -> f32 {
    0.01
}
fn default_not_running_sound() -> String {
    "appnotclose".into()
}
fn default_terminate_programs() -> Vec<String> {
    vec!["taskkill".into(), "pkill".into(), "killall".into()]
}

impl AssistantConfig {
    /// Parse a config document. Relative paths are resolved against `base_dir`.
    pub fn from_json(contents: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let raw: serde_json::Value = serde_json::from_str(contents)?;

        let missing: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| raw.get(**key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        let mut config: AssistantConfig = serde_json::from_value(raw)?;
        config.debounce_window()?;
        config.resolve_relative_to(base_dir);
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.recognizer_model_path,
            &mut self.hello_phrases_path,
            &mut self.keywords_path,
            &mut self.commands_path,
            &mut self.sound_directory,
        ] {
            *path = resolve(base, path);
        }

        self.app_root = if self.app_root.as_os_str().is_empty() {
            base.to_path_buf()
        } else {
            resolve(base, &self.app_root)
        };

        if let Some(dir) = self.log_dir.take() {
            self.log_dir = Some(resolve(base, &dir));
        }
    }

    /// Check that the model files needed by the voice loop exist.
    pub fn ensure_models(&self) -> Result<(), ConfigError> {
        if !self.recognizer_model_path.exists() {
            return Err(ConfigError::ModelNotFound {
                what: "recognizer model",
                path: self.recognizer_model_path.clone(),
            });
        }
        if !self.keywords_path.exists() {
            return Err(ConfigError::ModelNotFound {
                what: "wake-word model",
                path: self.keywords_path.clone(),
            });
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            fuzzy: self.fuzzy_threshold,
            jaccard: self.jaccard_threshold,
        }
    }

    /// Negative values clamp to zero.
    pub fn debounce_window(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.debounce_secs.max(0.0)).map_err(|e| {
            ConfigError::InvalidValue {
                key: "debounce_secs",
                reason: e.to_string(),
            }
        })
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Read and validate the config file at `path`.
pub fn load_config(path: &Path) -> Result<AssistantConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    AssistantConfig::from_json(&contents, base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "recognizer_model_path": "models/ggml-small.bin",
        "hello_phrases_path": "sounds/hello",
        "keywords_path": "models/jarvis.onnx",
        "assistant_tbr_phrases": ["джарвис", "пожалуйста"],
        "commands_path": "commands",
        "sound_directory": "sounds"
    }"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AssistantConfig::from_json(MINIMAL, Path::new("/opt/jarvis")).unwrap();
        assert_eq!(config.language, "ru");
        assert_eq!(config.debounce_window().unwrap(), Duration::from_secs(2));
        assert_eq!(config.thresholds(), Thresholds::default());
        assert_eq!(config.max_silence_frames, 10);
        assert_eq!(config.not_running_sound, "appnotclose");
        assert_eq!(config.terminate_programs, vec!["taskkill", "pkill", "killall"]);
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let config = AssistantConfig::from_json(MINIMAL, Path::new("/opt/jarvis")).unwrap();
        assert_eq!(config.commands_path, PathBuf::from("/opt/jarvis/commands"));
        assert_eq!(config.sound_directory, PathBuf::from("/opt/jarvis/sounds"));
        assert_eq!(config.app_root, PathBuf::from("/opt/jarvis"));
    }

    #[test]
    fn test_all_missing_keys_reported() {
        let err = AssistantConfig::from_json(
            r#"{"commands_path": "commands", "sound_directory": "sounds"}"#,
            Path::new("."),
        )
        .unwrap_err();
        match err {
            ConfigError::MissingKeys(keys) => {
                assert_eq!(
                    keys,
                    vec![
                        "recognizer_model_path",
                        "hello_phrases_path",
                        "keywords_path",
                        "assistant_tbr_phrases",
                    ]
                );
            }
            other => panic!("expected MissingKeys, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_debounce_is_invalid_value() {
        let json = MINIMAL.replacen('{', r#"{"debounce_secs": 1e20,"#, 1);
        let err = AssistantConfig::from_json(&json, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "debounce_secs", .. }));
    }

    #[test]
    fn test_negative_debounce_clamps_to_zero() {
        let json = MINIMAL.replacen('{', r#"{"debounce_secs": -3.0,"#, 1);
        let config = AssistantConfig::from_json(&json, Path::new(".")).unwrap();
        assert_eq!(config.debounce_window().unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = AssistantConfig::from_json("{ not json", Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_ensure_models_reports_missing_recognizer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = load_config(&path).unwrap();
        match config.ensure_models().unwrap_err() {
            ConfigError::ModelNotFound { what, path } => {
                assert_eq!(what, "recognizer model");
                assert!(path.ends_with("models/ggml-small.bin"));
            }
            other => panic!("expected ModelNotFound, got {other:?}"),
        }

        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/ggml-small.bin"), b"").unwrap();
        std::fs::write(dir.path().join("models/jarvis.onnx"), b"").unwrap();
        assert!(config.ensure_models().is_ok());
    }
}
