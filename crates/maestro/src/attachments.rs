//! Files the user attaches to a turn

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

use crate::errors::{AgentError, AgentResult};
use crate::models::message::{FileSource, MessageContent};

/// Files up to this size travel inline in the request; larger ones are uploaded
pub const INLINE_LIMIT: usize = 20 * 1024 * 1024;

/// Uploads large files ahead of time and returns a uri the backend can read
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AttachmentUploader: Send + Sync {
    async fn upload(&self, name: &str, mime_type: &str, bytes: Vec<u8>) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum AttachmentState {
    Pending,
    Ready,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentData {
    Inline(Vec<u8>),
    Remote(String),
}

/// A user file, created Pending and never modified once Ready
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data: Option<AttachmentData>,
    pub state: AttachmentState,
}

impl Attachment {
    pub fn pending(name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: None,
            state: AttachmentState::Pending,
        }
    }

    /// Read `path` and make it ready, uploading it when it is too large to inline.
    /// Failures are recorded on the attachment rather than returned.
    pub async fn load(path: &Path, uploader: Option<&dyn AttachmentUploader>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let attachment = Self::pending(name, guess_mime_type(path));

        match tokio::fs::read(path).await {
            Ok(bytes) => attachment.resolve(bytes, uploader).await,
            Err(e) => attachment.fail(format!("{}: {}", path.display(), e)),
        }
    }

    /// Make a pending attachment ready from bytes already in memory
    pub async fn resolve(mut self, bytes: Vec<u8>, uploader: Option<&dyn AttachmentUploader>) -> Self {
        if self.state != AttachmentState::Pending {
            return self;
        }

        if bytes.len() <= INLINE_LIMIT {
            self.data = Some(AttachmentData::Inline(bytes));
            self.state = AttachmentState::Ready;
            return self;
        }

        let Some(uploader) = uploader else {
            let reason = format!(
                "{} is {} bytes, larger than the {} byte inline limit, and no uploader is configured",
                self.name,
                bytes.len(),
                INLINE_LIMIT
            );
            return self.fail(reason);
        };

        match uploader.upload(&self.name, &self.mime_type, bytes).await {
            Ok(uri) => {
                info!(name = %self.name, %uri, "uploaded attachment");
                self.data = Some(AttachmentData::Remote(uri));
                self.state = AttachmentState::Ready;
                self
            }
            Err(e) => {
                let reason = format!("upload of {} failed: {}", self.name, e);
                self.fail(reason)
            }
        }
    }

    fn fail(mut self, reason: String) -> Self {
        warn!("attachment failed: {}", reason);
        self.data = None;
        self.state = AttachmentState::Failed { reason };
        self
    }

    pub fn is_ready(&self) -> bool {
        self.state == AttachmentState::Ready
    }

    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Inline bytes, for tools that need to read the file themselves
    pub fn bytes(&self) -> AgentResult<&[u8]> {
        match (&self.state, &self.data) {
            (AttachmentState::Ready, Some(AttachmentData::Inline(bytes))) => Ok(bytes),
            (AttachmentState::Ready, Some(AttachmentData::Remote(uri))) => Err(
                AgentError::AttachmentRead(format!("{} was uploaded to {}", self.name, uri)),
            ),
            (AttachmentState::Failed { reason }, _) => {
                Err(AgentError::AttachmentRead(reason.clone()))
            }
            _ => Err(AgentError::AttachmentRead(format!(
                "{} is not ready",
                self.name
            ))),
        }
    }

    /// Backend-facing part of the user message, only for ready attachments
    pub fn to_message_content(&self) -> Option<MessageContent> {
        if !self.is_ready() {
            return None;
        }
        let source = match self.data.as_ref()? {
            AttachmentData::Inline(bytes) => FileSource::Inline {
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
            AttachmentData::Remote(uri) => FileSource::Remote { uri: uri.clone() },
        };
        Some(MessageContent::file(&self.name, &self.mime_type, source))
    }
}

pub fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("webm") => "audio/webm",
        Some("mid") | Some("midi") => "audio/midi",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("musicxml") | Some("xml") => "application/vnd.recordare.musicxml+xml",
        Some("mp4") => "video/mp4",
        Some("txt") | Some("md") => "text/plain",
        _ => "application/octet-stream",
    }
}
