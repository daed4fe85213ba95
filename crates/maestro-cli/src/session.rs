use std::path::{Path, PathBuf};

use anyhow::Result;
use maestro::agent::Agent;
use maestro::attachments::Attachment;
use maestro::conversation::{Conversation, DisplayTurn};
use maestro::tools::ToolContext;
use tracing::warn;

use crate::prompt::{Input, InputType, Prompt};
use session_file::persist_messages;

pub mod player;
pub mod session_file;

const SCORE_MIME_TYPE: &str = "image/svg+xml";

pub struct Session<'a> {
    agent: Agent,
    ctx: ToolContext,
    conversation: Conversation,
    prompt: Box<dyn Prompt + 'a>,
    session_file: PathBuf,
    /// Files attached with /attach, sent with the next message
    pending: Vec<Attachment>,
    scores: usize,
}

impl<'a> Session<'a> {
    pub fn new(
        agent: Agent,
        ctx: ToolContext,
        conversation: Conversation,
        prompt: Box<dyn Prompt + 'a>,
        session_file: PathBuf,
    ) -> Self {
        Session {
            agent,
            ctx,
            conversation,
            prompt,
            session_file,
            pending: Vec::new(),
            scores: 0,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.setup_session();

        loop {
            let input = self.prompt.get_input()?;
            match input {
                Input {
                    input_type: InputType::Message,
                    content: Some(text),
                } => self.process_message(&text).await,
                Input {
                    input_type: InputType::Attach(path),
                    ..
                } => self.attach(&path).await,
                Input {
                    input_type: InputType::Render(path),
                    ..
                } => self.render_mix(&path),
                Input {
                    input_type: InputType::Exit,
                    ..
                } => break,
                _ => continue,
            }
        }
        self.close_session();
        Ok(())
    }

    pub async fn headless_start(&mut self, text: &str, attachments: &[PathBuf]) -> Result<()> {
        for path in attachments {
            self.attach(path).await;
        }
        self.process_message(text).await;
        self.prompt.close();
        Ok(())
    }

    async fn attach(&mut self, path: &Path) {
        let uploader = self.ctx.services.uploader.as_deref();
        let attachment = Attachment::load(path, uploader).await;
        if attachment.is_ready() {
            self.prompt.notify(&format!(
                "Attached {} ({}), it will be sent with your next message.",
                attachment.name, attachment.mime_type
            ));
            self.pending.push(attachment);
        } else {
            self.prompt
                .notify(&format!("Could not attach {}: {:?}", path.display(), attachment.state));
        }
    }

    async fn process_message(&mut self, text: &str) {
        let attachments = std::mem::take(&mut self.pending);

        self.prompt.show_busy();
        let result = tokio::select! {
            result = self.conversation.send(&self.agent, &mut self.ctx, text, attachments) => {
                Some(result.map(|_| ()))
            }
            _ = tokio::signal::ctrl_c() => None,
        };
        self.prompt.hide_busy();

        match result {
            Some(Ok(())) => {
                persist_messages(&self.session_file, self.conversation.history())
                    .unwrap_or_else(|e| warn!("Failed to persist messages: {}", e));
            }
            Some(Err(e)) => warn!("turn failed: {}", e),
            None => {
                self.prompt.notify(
                    "Interrupt: the conversation is back to before the last sent message.",
                );
                return;
            }
        }

        if let Some(turn) = self.conversation.turns().last().cloned() {
            self.prompt.render(&turn);
            self.save_scores(&turn);
        }
    }

    /// Engraved scores are only shown to the user, so keep them next to the session
    fn save_scores(&mut self, turn: &DisplayTurn) {
        for (svg, _) in turn
            .auxiliary
            .iter()
            .filter_map(|content| content.as_image())
            .filter(|(_, mime_type)| *mime_type == SCORE_MIME_TYPE)
        {
            self.scores += 1;
            let path = self
                .session_file
                .with_extension(format!("score-{}.svg", self.scores));
            match std::fs::write(&path, svg) {
                Ok(()) => self
                    .prompt
                    .notify(&format!("Score saved to {}", path.display())),
                Err(e) => warn!("could not save score: {}", e),
            }
        }
    }

    fn render_mix(&mut self, path: &Path) {
        let Some(bus) = self.ctx.runner.bus() else {
            self.prompt
                .notify("Nothing has played yet, run something in the Code Lab first.");
            return;
        };
        match bus.write_wav(path) {
            Ok(()) => self.prompt.notify(&format!(
                "Wrote {:.1}s of audio to {}",
                bus.duration(),
                path.display()
            )),
            Err(e) => self
                .prompt
                .notify(&format!("Could not write {}: {}", path.display(), e)),
        }
    }

    fn setup_session(&mut self) {
        self.prompt.notify(&format!(
            "Starting session. Recording to {}",
            self.session_file.display()
        ));
        for turn in self.conversation.turns() {
            self.prompt.render(turn);
        }
        self.prompt.maestro_ready();
    }

    fn close_session(&mut self) {
        self.prompt.notify(&format!(
            "Closing session. Recorded to {}",
            self.session_file.display()
        ));
        self.prompt.close();
    }
}
