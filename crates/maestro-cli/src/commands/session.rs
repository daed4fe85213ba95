use std::path::Path;

use anyhow::{bail, Result};
use console::style;
use maestro::agent::{Agent, AgentConfig};
use maestro::audio::PolyglotRunner;
use maestro::conversation::Conversation;
use maestro::providers::factory;
use maestro::services::speech::OpenAiSpeech;
use maestro::services::Services;
use maestro::tools::ToolContext;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::profile::{provider_config, resolve_profile, Profile};
use crate::prompt::rustyline::RustylinePrompt;
use crate::session::player::FileSpeechPlayer;
use crate::session::session_file::{read_messages, session_path};
use crate::session::Session;

pub fn build_session<'a>(
    session_name: Option<String>,
    profile: Option<String>,
    resume: bool,
) -> Result<Box<Session<'a>>> {
    let session_name = session_name.unwrap_or_else(generate_name);
    let session_file = session_path(&session_name)?;

    let conversation = if resume {
        if !session_file.exists() {
            bail!("No session named '{}' to resume", session_name);
        }
        Conversation::resume(read_messages(&session_file)?)
    } else {
        if session_file.exists() {
            println!(
                "{}",
                style(format!(
                    "Session '{}' already exists, starting it over. Use --resume to continue it.",
                    session_name
                ))
                .yellow()
            );
        }
        Conversation::new()
    };

    let profile = resolve_profile(profile.as_deref())?;
    let (agent, ctx) = build_studio(&profile, &session_file, &session_name)?;
    let conversation = conversation.with_model(profile.model.clone());

    Ok(Box::new(Session::new(
        agent,
        ctx,
        conversation,
        Box::new(RustylinePrompt::new()),
        session_file,
    )))
}

/// Agent and studio for `profile`, with keys and speech taken from the environment
pub fn build_studio(
    profile: &Profile,
    session_file: &Path,
    session_name: &str,
) -> Result<(Agent, ToolContext)> {
    let provider = factory::get_provider(provider_config(profile)?)?;
    let agent = Agent::new(provider).with_config(AgentConfig {
        voice_output: profile.voice_output,
        ..Default::default()
    });

    let clips = session_file
        .parent()
        .map(|dir| dir.join("clips"))
        .unwrap_or_else(|| "clips".into());
    let mut services = Services::default().with_player(FileSpeechPlayer::new(clips, session_name));
    if let Ok(speech) = OpenAiSpeech::from_env() {
        services = services.with_speech(speech);
    }

    let mut ctx = ToolContext::new(PolyglotRunner::in_memory(), services);
    ctx.app.api_keys.elevenlabs = std::env::var("ELEVENLABS_API_KEY").ok();
    ctx.app.api_keys.youtube = std::env::var("YOUTUBE_API_KEY").ok();
    Ok((agent, ctx))
}

fn generate_name() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}
