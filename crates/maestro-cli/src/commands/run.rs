use std::path::PathBuf;

use anyhow::Result;
use maestro::conversation::Conversation;

use crate::profile::resolve_profile;
use crate::prompt::rustyline::RustylinePrompt;
use crate::session::session_file::session_path;
use crate::session::Session;

use super::session::build_studio;

/// One turn without a prompt, recorded like any other session
pub async fn execute(
    text: String,
    attachments: Vec<PathBuf>,
    profile: Option<String>,
    session_name: Option<String>,
) -> Result<()> {
    let session_name = session_name.unwrap_or_else(|| "run".to_string());
    let session_file = session_path(&session_name)?;
    let profile = resolve_profile(profile.as_deref())?;
    let (agent, ctx) = build_studio(&profile, &session_file, &session_name)?;

    let mut session = Session::new(
        agent,
        ctx,
        Conversation::new().with_model(profile.model.clone()),
        Box::new(RustylinePrompt::new()),
        session_file,
    );
    session.headless_start(&text, &attachments).await
}
