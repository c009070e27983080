//! Entry points that make the fish sing or talk

use crate::audio::decoder::SimpleDecoder;
use crate::audio::types::PcmBuffer;
use crate::device::FishDevice;
use crate::error::{Error, Result};
use crate::playback::{PlaybackController, PlaybackReport};
use crate::speech::SpeechSynthesizer;
use fish_common::playlist::DEFAULT_RETENTION;
use fish_common::{ItemType, PlayedItem, PlaylistStore};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Plays sound files and synthesized speech on one fish
pub struct Performer {
    device: FishDevice,
    store: Arc<PlaylistStore>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    controller: PlaybackController,
    sound_dir: PathBuf,
    retention: Duration,
}

impl Performer {
    /// Performer without speech synthesis; [`Performer::say`] only logs the text
    pub fn new(device: FishDevice, store: Arc<PlaylistStore>, sound_dir: impl Into<PathBuf>) -> Self {
        Self {
            device,
            store,
            speech: None,
            controller: PlaybackController::default(),
            sound_dir: sound_dir.into(),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn device(&self) -> &FishDevice {
        &self.device
    }

    pub fn store(&self) -> &Arc<PlaylistStore> {
        &self.store
    }

    pub fn sound_dir(&self) -> &Path {
        &self.sound_dir
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Play `name` from the sound directory with mouth animation.
    ///
    /// The song is recorded as played before the file is read, so a broken
    /// file is not picked again right away. A recording failure is only logged.
    #[instrument(skip(self))]
    pub async fn play_sound_file(&self, name: &str) -> Result<()> {
        if !is_plain_file_name(name) {
            return Err(Error::InvalidInput(format!(
                "'{}' is not a file name inside the sound directory",
                name
            )));
        }

        info!("Playing sound file");

        if let Err(e) = self
            .store
            .add_played_item(PlayedItem::now(name, ItemType::Song), self.retention)
        {
            warn!("Failed to record played song: {}", e);
        }

        let path = self.sound_dir.join(name);
        let data = tokio::fs::read(&path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read sound file '{}': {}", path.display(), e),
            ))
        })?;

        let file_name = name.to_string();
        let pcm = tokio::task::spawn_blocking(move || SimpleDecoder::decode_named(&file_name, data))
            .await
            .map_err(|e| Error::Decode(format!("Decoder task failed: {}", e)))??;

        if pcm.is_empty() {
            info!("Sound file holds no audio, nothing to play");
            return Ok(());
        }

        self.play(pcm).await?;
        info!("Finished playing sound file");
        Ok(())
    }

    /// Speak `text` with mouth animation. Empty text is a no-op.
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn say(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            info!("Nothing to say");
            return Ok(());
        }

        let Some(speech) = &self.speech else {
            info!(text, "Speech disabled, would say");
            return Ok(());
        };

        info!(text, "Saying");
        let wav = speech.synthesize(text).await?;
        let pcm = tokio::task::spawn_blocking(move || SimpleDecoder::decode_wav(&wav))
            .await
            .map_err(|e| Error::Decode(format!("Decoder task failed: {}", e)))??;

        if pcm.is_empty() {
            warn!("Synthesized speech holds no audio");
            return Ok(());
        }

        self.play(pcm).await?;
        info!("Finished saying");
        Ok(())
    }

    async fn play(&self, pcm: PcmBuffer) -> Result<PlaybackReport> {
        self.controller.play_with_animation(&self.device, pcm).await
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("song.mp3"));
        assert!(is_plain_file_name("with space.wav"));
        assert!(!is_plain_file_name("../etc/passwd"));
        assert!(!is_plain_file_name("/abs/song.wav"));
        assert!(!is_plain_file_name("dir/song.wav"));
        assert!(!is_plain_file_name(""));
    }
}
