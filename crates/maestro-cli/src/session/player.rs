use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use maestro::services::speech::{SpeechAudio, SpeechPlayer};
use tracing::info;

/// Writes every clip into a directory instead of playing it
pub struct FileSpeechPlayer {
    dir: PathBuf,
    prefix: String,
    clips: AtomicUsize,
}

impl FileSpeechPlayer {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            clips: AtomicUsize::new(0),
        }
    }

    /// Where the next clip of `audio` would be written
    fn next_path(&self, audio: &SpeechAudio) -> PathBuf {
        let clip = self.clips.fetch_add(1, Ordering::SeqCst) + 1;
        self.dir
            .join(format!("{}-speech-{}.{}", self.prefix, clip, audio.extension()))
    }
}

#[async_trait]
impl SpeechPlayer for FileSpeechPlayer {
    async fn play(&self, audio: &SpeechAudio) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.next_path(audio);
        tokio::fs::write(&path, &audio.data).await?;
        info!(path = %path.display(), provider = %audio.provider, "saved speech clip");
        Ok(())
    }
}
