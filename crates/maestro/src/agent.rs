use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::attachments::{Attachment, AttachmentState};
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::Tool;
use crate::prompt_template::{load_prompt, load_prompt_file, SYSTEM_PROMPT};
use crate::providers::base::Provider;
use crate::services::speech::SpeechAudio;
use crate::tools::{ToolContext, ToolRegistry};

pub const DEFAULT_MAX_ROUNDS: usize = 25;
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Tool rounds allowed before a turn is abandoned
    pub max_rounds: usize,
    /// Upper bound on one backend call
    pub backend_timeout: Duration,
    /// Speak the final answer
    pub voice_output: bool,
    /// Template replacing the built-in system prompt
    pub system_prompt: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            voice_output: false,
            system_prompt: None,
        }
    }
}

/// One user turn
#[derive(Debug, Clone, Default)]
pub struct ConverseRequest {
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// Backend history before this turn
    pub history: Vec<Message>,
    /// Overrides the provider's default model
    pub model: Option<String>,
}

impl ConverseRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConverseOutcome {
    /// Final assistant text
    pub text: String,
    /// Tool output meant only for the user, such as engraved scores
    pub auxiliary: Vec<Content>,
    /// Backend history including this turn
    pub history: Vec<Message>,
    /// Tool rounds it took
    pub rounds: usize,
    /// The spoken answer, when voice output is on and synthesis produced audio
    pub speech: Option<SpeechAudio>,
}

/// Agent integrates a foundational LLM with the studio tools it pilots
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    config: AgentConfig,
}

impl Agent {
    /// Create a new Agent with the specified provider and every studio tool
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            provider,
            registry: ToolRegistry::standard(),
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.registry.tools()
    }

    /// Render the system prompt with the tool list and the studio status
    pub fn system_prompt(&self, ctx: &ToolContext) -> AgentResult<String> {
        let attachments: Vec<String> = ctx
            .attachments
            .iter()
            .map(|a| match &a.state {
                AttachmentState::Failed { reason } => {
                    format!("{} ({}, failed: {})", a.name, a.mime_type, reason)
                }
                state => format!(
                    "{} ({}, {})",
                    a.name,
                    a.mime_type,
                    if *state == AttachmentState::Ready { "ready" } else { "pending" }
                ),
            })
            .collect();
        let context = json!({
            "tools": self.registry.tools(),
            "studio": ctx.app.snapshot(),
            "attachments": attachments,
        });

        let rendered = match &self.config.system_prompt {
            Some(path) => load_prompt_file(path.clone(), &context),
            None => load_prompt(SYSTEM_PROMPT, &context),
        };
        rendered.map_err(|e| AgentError::Internal(e.to_string()))
    }

    async fn complete(
        &self,
        model: &str,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> AgentResult<Message> {
        let timeout = self.config.backend_timeout;
        let (response, usage) = tokio::time::timeout(
            timeout,
            self.provider.complete(model, system, messages, tools),
        )
        .await
        .map_err(|_| AgentError::Timeout(timeout.as_secs()))??;
        debug!(
            input = ?usage.input_tokens,
            output = ?usage.output_tokens,
            "backend usage"
        );
        Ok(response)
    }

    /// Dispatch every request of one round in declared order. Each request
    /// gets exactly one response, errors included.
    async fn dispatch_round(
        &self,
        requests: &[ToolRequest],
        ctx: &mut ToolContext,
        auxiliary: &mut Vec<Content>,
    ) -> Message {
        let mut reply = Message::user();
        for request in requests {
            let name = request.name().unwrap_or("unknown").to_string();
            let output = match request.tool_call.clone() {
                Ok(call) => self.registry.dispatch(call, ctx).await,
                Err(e) => Err(e),
            };
            match &output {
                Ok(contents) => auxiliary.extend(contents.iter().filter(|c| c.is_user_only()).cloned()),
                Err(e) => warn!(tool = %name, kind = e.kind(), "tool call failed: {}", e),
            }
            reply = reply.with_tool_response(request.id.clone(), name, output);
        }
        reply
    }

    /// Answer one user turn, running tools until the backend replies with
    /// plain text
    pub async fn converse(
        &self,
        ctx: &mut ToolContext,
        request: ConverseRequest,
    ) -> AgentResult<ConverseOutcome> {
        let ConverseRequest {
            text,
            attachments,
            history,
            model,
        } = request;
        let model = model.unwrap_or_else(|| self.provider.default_model().to_string());

        let mut message = Message::user().with_text(text);
        for attachment in &attachments {
            match attachment.to_message_content() {
                Some(content) => message = message.with_content(content),
                None => warn!(name = %attachment.name, "attachment is not ready, leaving it out"),
            }
        }
        ctx.attachments = attachments;

        let tools = self.registry.tools();
        let mut messages = history;
        messages.push(message);
        let mut auxiliary = Vec::new();
        let mut rounds = 0;

        let response = loop {
            let system = self.system_prompt(ctx)?;
            let response = self.complete(&model, &system, &messages, &tools).await?;
            let requests: Vec<ToolRequest> = response.tool_requests().into_iter().cloned().collect();
            if requests.is_empty() {
                break response;
            }
            if rounds == self.config.max_rounds {
                return Err(AgentError::LoopLimitExceeded(self.config.max_rounds));
            }
            rounds += 1;
            info!(round = rounds, calls = requests.len(), "running tool round");

            messages.push(response);
            let reply = self.dispatch_round(&requests, ctx, &mut auxiliary).await;
            messages.push(reply);
        };

        let text = response.text();
        messages.push(response);

        let speech = if self.config.voice_output && !text.trim().is_empty() {
            self.speak(ctx, &text).await
        } else {
            None
        };

        Ok(ConverseOutcome {
            text,
            auxiliary,
            history: messages,
            rounds,
            speech,
        })
    }

    /// Synthesize and play `text`; failures are logged, never returned
    async fn speak(&self, ctx: &ToolContext, text: &str) -> Option<SpeechAudio> {
        let audio = match ctx.synthesize(text, None).await {
            Ok(Some(audio)) => audio,
            Ok(None) => return None,
            Err(e) => {
                warn!("speech synthesis failed: {}", e);
                return None;
            }
        };
        if let Err(e) = ctx.services.player.play(&audio).await {
            warn!("speech playback failed: {}", e);
        }
        Some(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::MessageContent;
    use crate::models::tool::ToolCall;
    use crate::providers::mock::MockProvider;
    use crate::services::speech::{MockSpeechPlayer, MockSpeechSynthesizer};
    use crate::services::Services;
    use crate::tools::test_support::context;
    use crate::tools::test_support::context_with;

    fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> Message {
        Message::assistant().with_tool_request(id, Ok(ToolCall::new(name, arguments)))
    }

    fn responses(message: &Message) -> Vec<&crate::models::message::ToolResponse> {
        message
            .content
            .iter()
            .filter_map(MessageContent::as_tool_response)
            .collect()
    }

    #[tokio::test]
    async fn test_plain_text_reply() {
        let agent = Agent::new(Box::new(MockProvider::new(vec![
            Message::assistant().with_text("Hello!"),
        ])));
        let mut ctx = context();

        let outcome = agent
            .converse(&mut ctx, ConverseRequest::new("Hi"))
            .await
            .unwrap();
        assert_eq!(outcome.text, "Hello!");
        assert_eq!(outcome.rounds, 0);
        assert_eq!(outcome.history.len(), 2);
        assert!(outcome.speech.is_none());
    }

    #[tokio::test]
    async fn test_batch_collects_every_result_in_order() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("navigateTo", json!({"view": "effects"}))))
                .with_tool_request("2", Ok(ToolCall::new("navigate", json!({"view": "effects"})))),
            Message::assistant().with_text("Done"),
        ]);
        let requests = provider.requests();
        let agent = Agent::new(Box::new(provider));
        let mut ctx = context();

        let outcome = agent
            .converse(&mut ctx, ConverseRequest::new("Show effects"))
            .await
            .unwrap();
        assert_eq!(outcome.text, "Done");
        assert_eq!(outcome.rounds, 1);
        assert_eq!(ctx.app.view, crate::state::View::Effects);

        // user, assistant with calls, tool results, final answer
        assert_eq!(outcome.history.len(), 4);
        let results = responses(&outcome.history[2]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "1");
        assert_eq!(
            results[0].tool_result,
            Err(AgentError::ToolNotFound("navigateTo".to_string()))
        );
        assert_eq!(results[1].name, "navigate");
        assert!(results[1].tool_result.is_ok());

        // the second backend call saw both results
        let sent = requests.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].len(), 3);
    }

    #[tokio::test]
    async fn test_unparseable_request_gets_error_response() {
        let agent = Agent::new(Box::new(MockProvider::new(vec![
            Message::assistant().with_tool_request(
                "x",
                Err(AgentError::InvalidParameters("bad json".to_string())),
            ),
            Message::assistant().with_text("Sorry"),
        ])));
        let mut ctx = context();

        let outcome = agent
            .converse(&mut ctx, ConverseRequest::new("?"))
            .await
            .unwrap();
        let results = responses(&outcome.history[2]);
        assert_eq!(results[0].name, "unknown");
        assert!(results[0].tool_result.is_err());
    }

    #[tokio::test]
    async fn test_round_cap() {
        let looping: Vec<Message> = (0..4)
            .map(|i| tool_call(&i.to_string(), "listVoices", json!({})))
            .collect();
        let agent = Agent::new(Box::new(MockProvider::new(looping))).with_config(AgentConfig {
            max_rounds: 3,
            ..Default::default()
        });
        let mut ctx = context();

        let err = agent
            .converse(&mut ctx, ConverseRequest::new("loop"))
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::LoopLimitExceeded(3));
    }

    #[tokio::test]
    async fn test_backend_errors_and_timeout() {
        let agent = Agent::new(Box::new(MockProvider::with_results(vec![Err(
            "503 Service Unavailable".to_string(),
        )])));
        let mut ctx = context();
        let err = agent
            .converse(&mut ctx, ConverseRequest::new("Hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Provider(m) if m.contains("503")));

        let slow = MockProvider::new(vec![Message::assistant().with_text("late")])
            .with_delay(Duration::from_millis(200));
        let agent = Agent::new(Box::new(slow)).with_config(AgentConfig {
            backend_timeout: Duration::from_millis(20),
            ..Default::default()
        });
        let err = agent
            .converse(&mut ctx, ConverseRequest::new("Hi"))
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::Timeout(0));
    }

    #[tokio::test]
    async fn test_user_only_content_becomes_auxiliary() {
        let agent = Agent::new(Box::new(MockProvider::new(vec![
            tool_call(
                "1",
                "generateSheetMusic",
                json!({"title": "Ode", "notes": ["e4", "e4", "f4", "g4"]}),
            ),
            Message::assistant().with_text("Here is your score"),
        ])));
        let mut ctx = context();

        let outcome = agent
            .converse(&mut ctx, ConverseRequest::new("Write the opening of Ode to Joy"))
            .await
            .unwrap();
        assert_eq!(outcome.auxiliary.len(), 1);
        assert_eq!(outcome.auxiliary[0].as_image().map(|(_, mime)| mime), Some("image/svg+xml"));
    }

    #[tokio::test]
    async fn test_ready_attachments_are_sent_and_visible_to_tools() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("Nice take")]);
        let requests = provider.requests();
        let agent = Agent::new(Box::new(provider));
        let mut ctx = context();

        let ready = Attachment::pending("take.wav", "audio/wav")
            .resolve(vec![1, 2, 3], None)
            .await;
        let pending = Attachment::pending("later.wav", "audio/wav");
        agent
            .converse(
                &mut ctx,
                ConverseRequest::new("Listen").with_attachments(vec![ready, pending]),
            )
            .await
            .unwrap();

        let sent = requests.lock().unwrap();
        let files: Vec<_> = sent[0][0]
            .content
            .iter()
            .filter(|c| matches!(c, MessageContent::File(_)))
            .collect();
        assert_eq!(files.len(), 1);
        assert_eq!(ctx.attachments.len(), 2);
    }

    #[tokio::test]
    async fn test_voice_output_plays_answer() {
        let mut speech = MockSpeechSynthesizer::new();
        speech
            .expect_synthesize()
            .withf(|text| text == "All set")
            .times(1)
            .returning(|_| Ok(Some(SpeechAudio::new(vec![1], "audio/mpeg", "openai"))));
        let mut player = MockSpeechPlayer::new();
        player
            .expect_play()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("no output device")));

        let agent = Agent::new(Box::new(MockProvider::new(vec![
            Message::assistant().with_text("All set"),
        ])))
        .with_config(AgentConfig {
            voice_output: true,
            ..Default::default()
        });
        let mut ctx = context_with(Services::default().with_speech(speech).with_player(player));

        let outcome = agent
            .converse(&mut ctx, ConverseRequest::new("Set it up"))
            .await
            .unwrap();
        assert_eq!(outcome.text, "All set");
        assert_eq!(outcome.speech.map(|s| s.provider), Some("openai".to_string()));
    }
}
