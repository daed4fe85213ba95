use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::attachments::Attachment;

/// Outcome of reading a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SheetMusicReading {
    /// A recognizer transcribed the score
    Transcribed {
        title: Option<String>,
        notes: Vec<String>,
        summary: String,
    },
    /// No recognizer is available; the score is already attached to the
    /// conversation for the model to read itself
    Attached { name: String, mime_type: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetMusicResult {
    pub title: String,
    pub composer: Option<String>,
    pub url: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SheetMusicService: Send + Sync {
    async fn read(&self, attachment: &Attachment) -> Result<SheetMusicReading>;

    async fn search(&self, query: &str) -> Result<Vec<SheetMusicResult>>;
}

/// Used when no sheet music backend is configured. Image scores are left for
/// the model to read from the attachment; searching is unavailable.
pub struct UnconfiguredSheetMusic;

#[async_trait]
impl SheetMusicService for UnconfiguredSheetMusic {
    async fn read(&self, attachment: &Attachment) -> Result<SheetMusicReading> {
        if !attachment.is_image() {
            return Err(anyhow!(
                "Only image scores can be read without a sheet music service, {} is {}",
                attachment.name,
                attachment.mime_type
            ));
        }
        if !attachment.is_ready() {
            return Err(anyhow!("{} is not ready", attachment.name));
        }
        Ok(SheetMusicReading::Attached {
            name: attachment.name.clone(),
            mime_type: attachment.mime_type.clone(),
        })
    }

    async fn search(&self, _query: &str) -> Result<Vec<SheetMusicResult>> {
        Err(anyhow!("No sheet music catalogue is configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_image_is_left_to_the_model() {
        let attachment = Attachment::pending("score.png", "image/png")
            .resolve(vec![137, 80, 78, 71], None)
            .await;
        let reading = UnconfiguredSheetMusic.read(&attachment).await.unwrap();
        assert_eq!(
            reading,
            SheetMusicReading::Attached {
                name: "score.png".to_string(),
                mime_type: "image/png".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_non_image_and_search_fail() {
        let attachment = Attachment::pending("score.pdf", "application/pdf")
            .resolve(vec![1, 2], None)
            .await;
        assert!(UnconfiguredSheetMusic.read(&attachment).await.is_err());
        assert!(UnconfiguredSheetMusic.search("nocturne").await.is_err());
    }
}
