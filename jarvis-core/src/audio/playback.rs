//! WAV playback via rodio.
//!
//! Every call opens its own output stream and sink and releases them when it
//! returns, so no output device is held between responses.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait};
use rand::seq::SliceRandom;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{error, info, warn};

/// Something that can play a sound file to completion.
pub trait SoundPlayer: Send + Sync {
    /// Play `path`, blocking until playback finishes.
    fn play_file(&self, path: &Path) -> anyhow::Result<()>;
}

/// Plays files through the default (or a named) output device.
#[derive(Debug, Clone)]
pub struct RodioPlayer {
    output_device: Option<String>,
    volume: f32,
}

impl RodioPlayer {
    pub fn new(output_device: Option<String>, volume: f32) -> Self {
        Self {
            output_device,
            volume,
        }
    }
}

impl SoundPlayer for RodioPlayer {
    fn play_file(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::open(path).with_context(|| format!("File not found: {}", path.display()))?;
        let source = Decoder::new(BufReader::new(file))
            .with_context(|| format!("Failed to decode {}", path.display()))?;

        let (_stream, stream_handle) =
            open_output_stream(self.output_device.as_deref()).map_err(anyhow::Error::msg)?;
        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| anyhow::anyhow!("Failed to create audio sink: {}", e))?;
        sink.set_volume(self.volume.clamp(0.0, 2.0));

        info!(path = %path.display(), "Playback started");
        sink.append(source);
        sink.sleep_until_end();
        info!(path = %path.display(), "Playback finished");

        Ok(())
    }
}

/// Open the audio output stream for a named or default device.
fn open_output_stream(
    output_device_name: Option<&str>,
) -> Result<(OutputStream, OutputStreamHandle), String> {
    if let Some(name) = output_device_name {
        let host = cpal::default_host();
        let device = host
            .output_devices()
            .map_err(|e| format!("Failed to enumerate output devices: {}", e))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false));

        match device {
            Some(dev) => OutputStream::try_from_device(&dev)
                .map_err(|e| format!("Failed to open output device '{}': {}", name, e)),
            None => {
                warn!(
                    device = %name,
                    "Configured output device not found, falling back to default"
                );
                OutputStream::try_default()
                    .map_err(|e| format!("No audio output device available: {}", e))
            }
        }
    } else {
        OutputStream::try_default().map_err(|e| format!("No audio output device available: {}", e))
    }
}

/// Logical sound names resolved against a directory, played through a
/// shared [`SoundPlayer`].
#[derive(Clone)]
pub struct SoundLibrary {
    dir: PathBuf,
    player: Arc<dyn SoundPlayer>,
}

impl SoundLibrary {
    pub fn new(dir: impl Into<PathBuf>, player: Arc<dyn SoundPlayer>) -> Self {
        Self {
            dir: dir.into(),
            player,
        }
    }

    /// `<dir>/<name>.wav`
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.wav"))
    }

    pub fn player(&self) -> &Arc<dyn SoundPlayer> {
        &self.player
    }

    /// Play one named sound. A missing file is logged and skipped.
    /// Returns whether anything was played.
    pub fn play(&self, name: &str) -> bool {
        let path = self.resolve(name);
        if !path.exists() {
            error!(path = %path.display(), "Sound file not found");
            return false;
        }
        match self.player.play_file(&path) {
            Ok(()) => true,
            Err(e) => {
                error!(path = %path.display(), error = %format!("{e:#}"), "Sound playback failed");
                false
            }
        }
    }

    /// Play one of `names` chosen at random.
    pub fn play_random(&self, names: &[String]) -> bool {
        match names.choose(&mut rand::thread_rng()) {
            Some(name) => {
                info!(sound = %name, "Selected voice response");
                self.play(name)
            }
            None => {
                warn!("Sound list is empty, nothing to play");
                false
            }
        }
    }
}

impl std::fmt::Debug for SoundLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundLibrary").field("dir", &self.dir).finish()
    }
}

/// Play a random `.wav` from `dir` (greetings).
pub fn play_random_from_dir(player: &dyn SoundPlayer, dir: &Path) -> anyhow::Result<()> {
    let mut wavs: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read sound directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("wav"))
                .unwrap_or(false)
        })
        .collect();
    wavs.sort();

    let chosen = wavs
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| anyhow::anyhow!("No .wav files in {}", dir.display()))?;
    player.play_file(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        played: Mutex<Vec<PathBuf>>,
    }

    impl SoundPlayer for Recorder {
        fn play_file(&self, path: &Path) -> anyhow::Result<()> {
            self.played.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn test_resolve_appends_wav() {
        let library = SoundLibrary::new("/sounds", Arc::new(Recorder::default()));
        assert_eq!(library.resolve("ok1"), PathBuf::from("/sounds/ok1.wav"));
    }

    #[test]
    fn test_missing_sound_is_not_played() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let library = SoundLibrary::new(dir.path(), recorder.clone());
        assert!(!library.play("ghost"));
        assert!(recorder.played.lock().unwrap().is_empty());
    }

    #[test]
    fn test_play_random_picks_an_existing_sound() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok1.wav"), b"").unwrap();
        std::fs::write(dir.path().join("ok2.wav"), b"").unwrap();
        let recorder = Arc::new(Recorder::default());
        let library = SoundLibrary::new(dir.path(), recorder.clone());

        assert!(library.play_random(&["ok1".into(), "ok2".into()]));
        let played = recorder.played.lock().unwrap();
        assert_eq!(played.len(), 1);
        assert!(played[0].ends_with("ok1.wav") || played[0].ends_with("ok2.wav"));
    }

    #[test]
    fn test_play_random_empty_list() {
        let library = SoundLibrary::new("/sounds", Arc::new(Recorder::default()));
        assert!(!library.play_random(&[]));
    }

    #[test]
    fn test_random_greeting_only_considers_wavs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.wav"), b"").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"").unwrap();
        let recorder = Recorder::default();

        play_random_from_dir(&recorder, dir.path()).unwrap();
        assert_eq!(
            recorder.played.lock().unwrap().as_slice(),
            [dir.path().join("hello.wav")]
        );
    }

    #[test]
    fn test_random_greeting_empty_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(play_random_from_dir(&Recorder::default(), dir.path()).is_err());
    }
}
