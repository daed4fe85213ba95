//! The closed set of tools the assistant can call
//!
//! Every tool is a [`ToolHandler`] registered by its exact name. Handlers get
//! the whole [`ToolContext`] mutably; calls in a batch run one after another
//! in the order the backend asked for them.

mod code_lab;
mod engraving;
mod keys;
mod media;
mod navigation;
mod sequencer;
mod studio;
mod voice;

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info};

use crate::attachments::Attachment;
use crate::audio::PolyglotRunner;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};
use crate::script::ScriptHost;
use crate::services::elevenlabs::DEFAULT_VOICE_ID;
use crate::services::speech::{synthesize_with_fallback, PremiumVoice, SpeechAudio};
use crate::services::Services;
use crate::state::AppState;

pub use engraving::{engrave, Clef};

/// Everything a tool may read or change
pub struct ToolContext {
    pub app: AppState,
    pub runner: PolyglotRunner,
    pub host: ScriptHost,
    pub services: Services,
    /// Attachments of the turn being answered
    pub attachments: Vec<Attachment>,
}

impl ToolContext {
    pub fn new(runner: PolyglotRunner, services: Services) -> Self {
        Self {
            app: AppState::default(),
            runner,
            host: ScriptHost::new(),
            services,
            attachments: Vec::new(),
        }
    }

    /// Premium voice settings, present once an ElevenLabs key is stored
    pub fn premium_voice<'a>(&'a self, voice_id: Option<&'a str>) -> Option<PremiumVoice<'a>> {
        let api_key = self.app.api_keys.elevenlabs.as_deref()?;
        let voice_id = voice_id
            .or(self.app.selected_voice.as_deref())
            .unwrap_or(DEFAULT_VOICE_ID);
        Some(PremiumVoice { voice_id, api_key })
    }

    /// Synthesize `text` with the premium voice when configured, falling back
    /// to the baseline synthesizer
    pub async fn synthesize(
        &self,
        text: &str,
        voice_id: Option<&str>,
    ) -> AgentResult<Option<SpeechAudio>> {
        let audio = synthesize_with_fallback(
            self.services.speech.as_ref(),
            self.services.premium_speech.as_ref(),
            self.premium_voice(voice_id),
            text,
        )
        .await?;
        Ok(audio)
    }

    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.name == name)
            .or_else(|| {
                self.attachments
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case(name))
            })
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name, description and argument schema advertised to the backend
    fn tool(&self) -> Tool;

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>>;
}

/// Tools by exact name
pub struct ToolRegistry {
    handlers: Vec<Box<dyn ToolHandler>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Every studio tool
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(navigation::Navigate);
        registry.register(keys::SetElevenLabsKey);
        registry.register(keys::SetYouTubeKey);
        registry.register(voice::CloneVoice);
        registry.register(voice::ListVoices);
        registry.register(voice::ListTracks);
        registry.register(voice::DeleteTrack);
        registry.register(voice::GenerateSpeech);
        registry.register(code_lab::ExecuteScript);
        registry.register(studio::ConfigureDrumPad);
        registry.register(studio::UpdateEffect);
        registry.register(media::SearchVideos);
        registry.register(media::AnalyzeVideo);
        registry.register(media::ReadSheetMusic);
        registry.register(media::SearchSheetMusic);
        registry.register(media::GenerateSheetMusic);
        registry.register(code_lab::UpdateCodeLab);
        registry.register(code_lab::RunCodeLab);
        registry.register(sequencer::GenerateSequencerPattern);
        registry.register(sequencer::ListSequencerPatterns);
        registry.register(sequencer::CreateSongArrangement);
        registry
    }

    /// Add a handler, replacing any handler with the same name
    pub fn register(&mut self, handler: impl ToolHandler + 'static) {
        let name = handler.tool().name;
        self.handlers.retain(|h| h.tool().name != name);
        self.handlers.push(Box::new(handler));
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.handlers.iter().map(|h| h.tool()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.handlers
            .iter()
            .find(|h| h.tool().name == name)
            .map(|h| h.as_ref())
    }

    /// Run one call. Unknown names and panics come back as errors, never unwind.
    pub async fn dispatch(&self, call: ToolCall, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let handler = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        info!(tool = %call.name, "dispatching tool call");
        debug!(tool = %call.name, arguments = %call.arguments, "tool arguments");

        AssertUnwindSafe(handler.call(call.arguments, ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(AgentError::ExecutionError(format!(
                    "{} panicked: {}",
                    call.name, reason
                )))
            })
    }
}

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> AgentResult<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AgentError::InvalidParameters(format!("Missing '{}' parameter", key)))
}

/// A required string that may not be blank
pub(crate) fn required_text<'a>(args: &'a Value, key: &str) -> AgentResult<&'a str> {
    let value = required_str(args, key)?.trim();
    if value.is_empty() {
        return Err(AgentError::InvalidParameters(format!(
            "'{}' must not be empty",
            key
        )));
    }
    Ok(value)
}

pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

pub(crate) fn optional_f64(args: &Value, key: &str) -> AgentResult<Option<f64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| AgentError::InvalidParameters(format!("'{}' must be a number", key))),
    }
}

pub(crate) fn optional_u64(args: &Value, key: &str) -> AgentResult<Option<u64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|n| n.fract() == 0.0 && *n >= 0.0).map(|n| n as u64))
            .map(Some)
            .ok_or_else(|| {
                AgentError::InvalidParameters(format!("'{}' must be a whole number", key))
            }),
    }
}
