use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{optional_str, required_text, ToolContext, ToolHandler};
use crate::attachments::Attachment;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::Tool;
use crate::services::tracks::{Track, TrackKind};
use crate::services::voices::VoiceSample;

const TITLE_CHARS: usize = 40;

pub struct CloneVoice;

#[async_trait]
impl ToolHandler for CloneVoice {
    fn tool(&self) -> Tool {
        Tool::new(
            "cloneVoice",
            "Clone a voice from audio recordings the user attached, then select it for speech. \
            Requires an ElevenLabs API key. Without `samples`, every ready audio attachment is used.",
            json!({
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": {"type": "string", "description": "Name for the new voice."},
                    "description": {"type": "string", "default": null, "description": "How the voice sounds."},
                    "samples": {
                        "type": "array",
                        "items": {"type": "string"},
                        "default": null,
                        "description": "File names of the attachments to clone from."
                    }
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let name = required_text(&arguments, "name")?;
        let description = optional_str(&arguments, "description").unwrap_or("");
        let api_key = ctx.app.api_keys.elevenlabs.clone().ok_or_else(|| {
            AgentError::InvalidParameters(
                "No ElevenLabs API key is set, ask the user for one and call setElevenLabsKey"
                    .into(),
            )
        })?;

        let chosen: Vec<&Attachment> = match arguments.get("samples").and_then(|v| v.as_array()) {
            Some(names) => names
                .iter()
                .filter_map(|v| v.as_str())
                .map(|n| {
                    ctx.attachment(n).ok_or_else(|| {
                        AgentError::InvalidParameters(format!("No attachment named '{}'", n))
                    })
                })
                .collect::<AgentResult<_>>()?,
            None => ctx
                .attachments
                .iter()
                .filter(|a| a.is_audio() && a.is_ready())
                .collect(),
        };
        if chosen.is_empty() {
            return Err(AgentError::InvalidParameters(
                "Attach at least one audio recording to clone a voice from".into(),
            ));
        }

        let mut samples = Vec::with_capacity(chosen.len());
        for attachment in chosen {
            if !attachment.is_audio() {
                return Err(AgentError::InvalidParameters(format!(
                    "{} is {}, not audio",
                    attachment.name, attachment.mime_type
                )));
            }
            samples.push(VoiceSample {
                name: attachment.name.clone(),
                mime_type: attachment.mime_type.clone(),
                data: attachment.bytes()?.to_vec(),
            });
        }

        let count = samples.len();
        let voice = ctx
            .services
            .voice_cloner
            .clone_voice(name, description, samples, &api_key)
            .await?;
        info!(voice_id = %voice.voice_id, samples = count, "voice cloned");

        let result = json!({
            "voiceId": voice.voice_id,
            "name": voice.name,
            "samples": count,
            "selected": true,
        });
        ctx.app.add_voice(voice);
        Ok(vec![Content::json(&result)])
    }
}

pub struct ListVoices;

#[async_trait]
impl ToolHandler for ListVoices {
    fn tool(&self) -> Tool {
        Tool::new(
            "listVoices",
            "List the cloned voices and which one is selected.",
            json!({"type": "object", "required": [], "properties": {}}),
        )
    }

    async fn call(&self, _arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let voices: Vec<Value> = ctx
            .app
            .voices
            .iter()
            .map(|voice| {
                json!({
                    "voiceId": voice.voice_id,
                    "name": voice.name,
                    "description": voice.description,
                    "selected": ctx.app.selected_voice.as_deref() == Some(voice.voice_id.as_str()),
                })
            })
            .collect();
        Ok(vec![Content::json(&json!(voices))])
    }
}

pub struct ListTracks;

#[async_trait]
impl ToolHandler for ListTracks {
    fn tool(&self) -> Tool {
        Tool::new(
            "listTracks",
            "List saved tracks, newest first.",
            json!({"type": "object", "required": [], "properties": {}}),
        )
    }

    async fn call(&self, _arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let tracks = ctx.services.tracks.list().await?;
        Ok(vec![Content::json(&json!(tracks))])
    }
}

pub struct DeleteTrack;

#[async_trait]
impl ToolHandler for DeleteTrack {
    fn tool(&self) -> Tool {
        Tool::new(
            "deleteTrack",
            "Delete a saved track by id.",
            json!({
                "type": "object",
                "required": ["id"],
                "properties": {
                    "id": {"type": "string", "description": "Id from listTracks."}
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let id = required_text(&arguments, "id")?;
        if !ctx.services.tracks.delete(id).await? {
            return Err(AgentError::InvalidParameters(format!("No track with id '{}'", id)));
        }
        Ok(vec![Content::text(format!("Deleted track {}", id))])
    }
}

pub struct GenerateSpeech;

#[async_trait]
impl ToolHandler for GenerateSpeech {
    fn tool(&self) -> Tool {
        Tool::new(
            "generateSpeech",
            "Speak text aloud and save it as a track. Uses the selected cloned voice when an \
            ElevenLabs key is set, otherwise the standard voice.",
            json!({
                "type": "object",
                "required": ["text"],
                "properties": {
                    "text": {"type": "string", "description": "What to say."},
                    "voiceId": {"type": "string", "default": null, "description": "Voice to use instead of the selected one."}
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let text = required_text(&arguments, "text")?;
        let voice_id = optional_str(&arguments, "voiceId");

        let audio = ctx.synthesize(text, voice_id).await?.ok_or_else(|| {
            AgentError::ExecutionError(
                "No speech synthesizer is available, set an ElevenLabs key to enable speech"
                    .into(),
            )
        })?;

        let title: String = text.chars().take(TITLE_CHARS).collect();
        let mut track = Track::new(title, TrackKind::Speech, &audio.mime_type);
        if audio.provider == "elevenlabs" {
            if let Some(voice) = ctx.premium_voice(voice_id) {
                track = track.with_voice(voice.voice_id);
            }
        }

        if let Err(e) = ctx.services.player.play(&audio).await {
            warn!("could not play speech: {}", e);
        }
        let track = ctx.services.tracks.save(track, audio.data.clone()).await?;
        info!(track = %track.id, provider = %audio.provider, "speech saved");

        Ok(vec![Content::json(&json!({
            "track": track,
            "provider": audio.provider,
        }))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::speech::{MockPremiumSpeech, MockSpeechSynthesizer, SpeechAudio};
    use crate::services::voices::{MockVoiceCloner, Voice};
    use crate::services::Services;
    use crate::tools::test_support::{context, context_with, json};
    use anyhow::anyhow;

    async fn audio_attachment(name: &str) -> Attachment {
        Attachment::pending(name, "audio/wav")
            .resolve(vec![1, 2, 3], None)
            .await
    }

    #[tokio::test]
    async fn test_clone_voice_uses_ready_audio_attachments() {
        let mut cloner = MockVoiceCloner::new();
        cloner
            .expect_clone_voice()
            .times(1)
            .withf(|name, _, samples, key| {
                name == "Narrator" && samples.len() == 2 && key == "xi-key"
            })
            .returning(|name, description, _, _| Ok(Voice::new("v-1", name, description)));

        let mut ctx = context_with(Services::default().with_voice_cloner(cloner));
        ctx.app.api_keys.elevenlabs = Some("xi-key".to_string());
        ctx.attachments = vec![
            audio_attachment("a.wav").await,
            audio_attachment("b.wav").await,
            Attachment::pending("c.png", "image/png")
                .resolve(vec![0], None)
                .await,
        ];

        let result = CloneVoice
            .call(json!({"name": "Narrator"}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(json(&result)["samples"], 2);
        assert_eq!(ctx.app.selected_voice.as_deref(), Some("v-1"));
        assert_eq!(ctx.app.voices.len(), 1);
    }

    #[tokio::test]
    async fn test_clone_voice_preconditions() {
        let mut ctx = context();
        let err = CloneVoice
            .call(json!({"name": "Narrator"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(m) if m.contains("setElevenLabsKey")));

        ctx.app.api_keys.elevenlabs = Some("xi-key".to_string());
        let err = CloneVoice
            .call(json!({"name": "Narrator"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(m) if m.contains("audio recording")));

        let err = CloneVoice
            .call(json!({"name": "Narrator", "samples": ["missing.wav"]}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(m) if m.contains("missing.wav")));
    }

    #[tokio::test]
    async fn test_generate_speech_falls_back_and_saves_track() {
        let mut premium = MockPremiumSpeech::new();
        premium
            .expect_synthesize()
            .times(1)
            .returning(|_, _, _| Err(anyhow!("quota exceeded")));
        let mut baseline = MockSpeechSynthesizer::new();
        baseline
            .expect_synthesize()
            .times(1)
            .returning(|_| Ok(Some(SpeechAudio::new(vec![9; 4], "audio/mpeg", "openai"))));

        let mut ctx = context_with(
            Services::default()
                .with_premium_speech(premium)
                .with_speech(baseline),
        );
        ctx.app.api_keys.elevenlabs = Some("xi-key".to_string());

        let result = GenerateSpeech
            .call(json!({"text": "Welcome to the studio"}), &mut ctx)
            .await
            .unwrap();
        let result = json(&result);
        assert_eq!(result["provider"], "openai");
        assert_eq!(result["track"]["size"], 4);
        assert_eq!(result["track"]["kind"], "speech");
        assert!(result["track"].get("voiceId").is_none());

        let tracks = ctx.services.tracks.list().await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "Welcome to the studio");
    }

    #[tokio::test]
    async fn test_generate_speech_without_any_synthesizer() {
        let mut ctx = context();
        let err = GenerateSpeech
            .call(json!({"text": "hello"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ExecutionError(_)));
    }

    #[tokio::test]
    async fn test_tracks_and_voices_listing() {
        let mut ctx = context();
        ctx.app.add_voice(Voice::new("v-1", "Narrator", "warm"));
        let voices = json(&ListVoices.call(json!({}), &mut ctx).await.unwrap());
        assert_eq!(voices[0]["selected"], true);

        let saved = ctx
            .services
            .tracks
            .save(Track::new("Take", TrackKind::Upload, "audio/wav"), vec![0; 8])
            .await
            .unwrap();
        let tracks = json(&ListTracks.call(json!({}), &mut ctx).await.unwrap());
        assert_eq!(tracks[0]["id"], saved.id.as_str());

        DeleteTrack
            .call(json!({"id": saved.id}), &mut ctx)
            .await
            .unwrap();
        let err = DeleteTrack
            .call(json!({"id": saved.id}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));
    }
}
