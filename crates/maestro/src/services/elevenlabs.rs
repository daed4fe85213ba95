use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::info;

use super::speech::{PremiumSpeech, SpeechAudio};
use super::voices::{Voice, VoiceCloner, VoiceSample};

pub const ELEVENLABS_HOST: &str = "https://api.elevenlabs.io";
pub const ELEVENLABS_MODEL: &str = "eleven_multilingual_v2";
/// Stock voice used when no cloned voice is selected
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// ElevenLabs voice cloning and text to speech. The api key is supplied per
/// call since the user may set or change it during a session.
pub struct ElevenLabsClient {
    client: Client,
    host: String,
}

impl ElevenLabsClient {
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(300)).build()?;
        Ok(Self {
            client,
            host: host.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), path)
    }
}

impl Default for ElevenLabsClient {
    fn default() -> Self {
        Self {
            client: Client::new(),
            host: ELEVENLABS_HOST.to_string(),
        }
    }
}

#[async_trait]
impl PremiumSpeech for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str, api_key: &str) -> Result<SpeechAudio> {
        let response = self
            .client
            .post(self.url(&format!("/v1/text-to-speech/{}", voice_id)))
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&json!({
                "text": text,
                "model_id": ELEVENLABS_MODEL,
            }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let bytes = response.bytes().await?;
                Ok(SpeechAudio::new(bytes.to_vec(), "audio/mpeg", "elevenlabs"))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow!("ElevenLabs speech failed ({}): {}", status, body))
            }
        }
    }
}

#[async_trait]
impl VoiceCloner for ElevenLabsClient {
    async fn clone_voice(
        &self,
        name: &str,
        description: &str,
        samples: Vec<VoiceSample>,
        api_key: &str,
    ) -> Result<Voice> {
        if samples.is_empty() {
            return Err(anyhow!("At least one audio sample is required"));
        }

        let mut form = Form::new()
            .text("name", name.to_string())
            .text("description", description.to_string());
        for sample in samples {
            let part = Part::bytes(sample.data)
                .file_name(sample.name)
                .mime_str(&sample.mime_type)?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(self.url("/v1/voices/add"))
            .header("xi-api-key", api_key)
            .multipart(form)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: Value = response.json().await?;
                let voice_id = body
                    .get("voice_id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow!("No voice_id in response"))?;
                info!(voice_id, name, "cloned voice");
                Ok(Voice::new(voice_id, name, description))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow!("ElevenLabs voice cloning failed ({}): {}", status, body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_synthesize() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice123"))
            .and(header("xi-api-key", "el_key"))
            .and(body_partial_json(json!({"text": "Take it from the top"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 16]))
            .mount(&mock_server)
            .await;

        let client = ElevenLabsClient::new(mock_server.uri())?;
        let audio = client
            .synthesize("Take it from the top", "voice123", "el_key")
            .await?;
        assert_eq!(audio.data.len(), 16);
        assert_eq!(audio.provider, "elevenlabs");
        Ok(())
    }

    #[tokio::test]
    async fn test_clone_voice() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/voices/add"))
            .and(header("xi-api-key", "el_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"voice_id": "cloned42"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ElevenLabsClient::new(mock_server.uri())?;
        let voice = client
            .clone_voice(
                "Narrator",
                "warm and low",
                vec![VoiceSample {
                    name: "take1.wav".to_string(),
                    mime_type: "audio/wav".to_string(),
                    data: vec![0; 64],
                }],
                "el_key",
            )
            .await?;

        assert_eq!(voice.voice_id, "cloned42");
        assert_eq!(voice.name, "Narrator");
        Ok(())
    }

    #[tokio::test]
    async fn test_clone_voice_requires_samples() {
        let client = ElevenLabsClient::default();
        let err = client
            .clone_voice("Narrator", "", vec![], "el_key")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sample"));
    }

    #[tokio::test]
    async fn test_rejected_key() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&mock_server)
            .await;

        let client = ElevenLabsClient::new(mock_server.uri())?;
        let err = client.synthesize("hi", "v", "bad").await.unwrap_err();
        assert!(err.to_string().contains("invalid api key"));
        Ok(())
    }
}
