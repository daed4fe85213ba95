use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum TrackKind {
    Speech,
    CodeLab,
    Upload,
}

/// Metadata of a stored recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub kind: TrackKind,
    pub mime_type: String,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    pub created: DateTime<Utc>,
}

impl Track {
    /// A new track with a fresh id; the size is filled in when it is saved
    pub fn new(title: impl Into<String>, kind: TrackKind, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            kind,
            mime_type: mime_type.into(),
            size: 0,
            voice_id: None,
            created: Utc::now(),
        }
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Newest first
    async fn list(&self) -> Result<Vec<Track>>;

    async fn save(&self, track: Track, data: Vec<u8>) -> Result<Track>;

    async fn audio(&self, id: &str) -> Result<Vec<u8>>;

    /// Returns whether a track was removed
    async fn delete(&self, id: &str) -> Result<bool>;
}

#[derive(Default)]
pub struct InMemoryTrackStore {
    tracks: Mutex<Vec<(Track, Vec<u8>)>>,
}

impl InMemoryTrackStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<(Track, Vec<u8>)>>> {
        self.tracks
            .lock()
            .map_err(|_| anyhow!("track store lock poisoned"))
    }
}

#[async_trait]
impl TrackStore for InMemoryTrackStore {
    async fn list(&self) -> Result<Vec<Track>> {
        let tracks = self.lock()?;
        let mut list: Vec<Track> = tracks.iter().map(|(track, _)| track.clone()).collect();
        list.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(list)
    }

    async fn save(&self, mut track: Track, data: Vec<u8>) -> Result<Track> {
        track.size = data.len();
        let mut tracks = self.lock()?;
        tracks.retain(|(existing, _)| existing.id != track.id);
        tracks.push((track.clone(), data));
        Ok(track)
    }

    async fn audio(&self, id: &str) -> Result<Vec<u8>> {
        let tracks = self.lock()?;
        tracks
            .iter()
            .find(|(track, _)| track.id == id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| anyhow!("No track with id {}", id))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut tracks = self.lock()?;
        let before = tracks.len();
        tracks.retain(|(track, _)| track.id != id);
        Ok(tracks.len() != before)
    }
}
