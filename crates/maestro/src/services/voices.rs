use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

/// A voice the premium synthesizer can speak with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    pub description: String,
    pub created: DateTime<Utc>,
}

impl Voice {
    pub fn new(
        voice_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            voice_id: voice_id.into(),
            name: name.into(),
            description: description.into(),
            created: Utc::now(),
        }
    }
}

/// One recording used to clone a voice
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSample {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VoiceCloner: Send + Sync {
    async fn clone_voice(
        &self,
        name: &str,
        description: &str,
        samples: Vec<VoiceSample>,
        api_key: &str,
    ) -> Result<Voice>;
}
