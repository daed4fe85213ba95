use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::providers::configs::OPENAI_HOST;

pub const OPENAI_SPEECH_MODEL: &str = "tts-1";
pub const OPENAI_SPEECH_VOICE: &str = "alloy";

/// A synthesized clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAudio {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub mime_type: String,
    /// Which synthesizer produced the clip
    pub provider: String,
}

impl SpeechAudio {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            provider: provider.into(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/ogg" => "ogg",
            _ => "mp3",
        }
    }
}

/// Baseline text to speech, always available
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// `None` when the synthesizer produces no audio at all
    async fn synthesize(&self, text: &str) -> Result<Option<SpeechAudio>>;
}

/// Higher quality speech in a chosen (possibly cloned) voice
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PremiumSpeech: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str, api_key: &str) -> Result<SpeechAudio>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechPlayer: Send + Sync {
    async fn play(&self, audio: &SpeechAudio) -> Result<()>;
}

/// Credentials that make the premium synthesizer usable
#[derive(Debug, Clone, Copy)]
pub struct PremiumVoice<'a> {
    pub voice_id: &'a str,
    pub api_key: &'a str,
}

/// Premium speech when configured, falling back to the baseline when it fails.
/// Without premium credentials the baseline is used directly.
pub async fn synthesize_with_fallback(
    baseline: &dyn SpeechSynthesizer,
    premium: &dyn PremiumSpeech,
    premium_voice: Option<PremiumVoice<'_>>,
    text: &str,
) -> Result<Option<SpeechAudio>> {
    if let Some(voice) = premium_voice {
        match premium.synthesize(text, voice.voice_id, voice.api_key).await {
            Ok(audio) => return Ok(Some(audio)),
            Err(e) => warn!("premium speech failed, using baseline: {}", e),
        }
    }
    baseline.synthesize(text).await
}

/// Produces no audio; used when no speech backend is configured
pub struct SilentSpeech;

#[async_trait]
impl SpeechSynthesizer for SilentSpeech {
    async fn synthesize(&self, text: &str) -> Result<Option<SpeechAudio>> {
        debug!(chars = text.len(), "speech disabled, skipping synthesis");
        Ok(None)
    }
}

/// Discards clips
pub struct NullPlayer;

#[async_trait]
impl SpeechPlayer for NullPlayer {
    async fn play(&self, _audio: &SpeechAudio) -> Result<()> {
        Ok(())
    }
}

/// OpenAI `audio/speech` endpoint
pub struct OpenAiSpeech {
    client: Client,
    host: String,
    api_key: String,
    model: String,
    voice: String,
}

impl OpenAiSpeech {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            client,
            host: host.into(),
            api_key: api_key.into(),
            model: OPENAI_SPEECH_MODEL.to_string(),
            voice: OPENAI_SPEECH_VOICE.to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")?;
        let host = std::env::var("OPENAI_HOST").unwrap_or_else(|_| OPENAI_HOST.to_string());
        Self::new(host, api_key)
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<Option<SpeechAudio>> {
        let url = format!("{}/v1/audio/speech", self.host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "input": text,
                "voice": self.voice,
                "response_format": "mp3",
            }))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let bytes = response.bytes().await?;
                Ok(Some(SpeechAudio::new(bytes.to_vec(), "audio/mpeg", "openai")))
            }
            status => Err(anyhow!("Speech request failed: {}", status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn clip(provider: &str) -> SpeechAudio {
        SpeechAudio::new(vec![1, 2, 3], "audio/mpeg", provider)
    }

    #[tokio::test]
    async fn test_premium_used_when_configured() {
        let mut premium = MockPremiumSpeech::new();
        premium
            .expect_synthesize()
            .withf(|text, voice, key| text == "hello" && voice == "v1" && key == "k")
            .times(1)
            .returning(|_, _, _| Ok(clip("elevenlabs")));
        let mut baseline = MockSpeechSynthesizer::new();
        baseline.expect_synthesize().times(0);

        let audio = synthesize_with_fallback(
            &baseline,
            &premium,
            Some(PremiumVoice {
                voice_id: "v1",
                api_key: "k",
            }),
            "hello",
        )
        .await
        .unwrap();
        assert_eq!(audio.map(|a| a.provider), Some("elevenlabs".to_string()));
    }

    #[tokio::test]
    async fn test_premium_failure_falls_back() {
        let mut premium = MockPremiumSpeech::new();
        premium
            .expect_synthesize()
            .times(1)
            .returning(|_, _, _| Err(anyhow!("quota exceeded")));
        let mut baseline = MockSpeechSynthesizer::new();
        baseline
            .expect_synthesize()
            .times(1)
            .returning(|_| Ok(Some(clip("openai"))));

        let audio = synthesize_with_fallback(
            &baseline,
            &premium,
            Some(PremiumVoice {
                voice_id: "v1",
                api_key: "k",
            }),
            "hello",
        )
        .await
        .unwrap();
        assert_eq!(audio.map(|a| a.provider), Some("openai".to_string()));
    }

    #[tokio::test]
    async fn test_baseline_without_premium() {
        let mut premium = MockPremiumSpeech::new();
        premium.expect_synthesize().times(0);
        let mut baseline = MockSpeechSynthesizer::new();
        baseline
            .expect_synthesize()
            .times(1)
            .returning(|_| Ok(Some(clip("openai"))));

        let audio = synthesize_with_fallback(&baseline, &premium, None, "hello")
            .await
            .unwrap();
        assert!(audio.is_some());
    }

    #[tokio::test]
    async fn test_silent_speech() {
        assert!(SilentSpeech.synthesize("hi").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_openai_speech_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/speech"))
            .and(header("Authorization", "Bearer test_key"))
            .and(body_partial_json(json!({"input": "Welcome back", "model": "tts-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFB, 0x90]))
            .mount(&mock_server)
            .await;

        let speech = OpenAiSpeech::new(mock_server.uri(), "test_key").unwrap();
        let audio = speech.synthesize("Welcome back").await.unwrap().unwrap();
        assert_eq!(audio.data, vec![0xFF, 0xFB, 0x90]);
        assert_eq!(audio.mime_type, "audio/mpeg");
        assert_eq!(audio.extension(), "mp3");
    }

    #[tokio::test]
    async fn test_openai_speech_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let speech = OpenAiSpeech::new(mock_server.uri(), "bad").unwrap();
        assert!(speech.synthesize("hi").await.is_err());
    }
}
