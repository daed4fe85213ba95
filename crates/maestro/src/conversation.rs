//! Display log and backend history of one studio session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::agent::{Agent, ConverseOutcome, ConverseRequest};
use crate::attachments::Attachment;
use crate::errors::AgentError;
use crate::models::content::Content;
use crate::models::message::Message;
use crate::models::role::Role;
use crate::tools::ToolContext;

pub const APOLOGY: &str = "Sorry, something went wrong while working on that. Please try again.";

/// A turn as the user sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayTurn {
    pub role: Role,
    pub text: String,
    /// Names of the files attached to a user turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    /// User-only tool output shown with an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auxiliary: Vec<Content>,
    #[serde(default)]
    pub error: bool,
    pub created: DateTime<Utc>,
}

impl DisplayTurn {
    fn user(text: &str, attachments: &[Attachment]) -> Self {
        Self {
            role: Role::User,
            text: text.to_string(),
            attachments: attachments.iter().map(|a| a.name.clone()).collect(),
            auxiliary: Vec::new(),
            error: false,
            created: Utc::now(),
        }
    }

    fn assistant(text: String, auxiliary: Vec<Content>) -> Self {
        Self {
            role: Role::Assistant,
            text,
            attachments: Vec::new(),
            auxiliary,
            error: false,
            created: Utc::now(),
        }
    }

    fn apology() -> Self {
        Self {
            error: true,
            ..Self::assistant(APOLOGY.to_string(), Vec::new())
        }
    }
}

/// Keeps what the user sees and what the backend is sent in step
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<DisplayTurn>,
    history: Vec<Message>,
    model: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue from a saved backend history
    pub fn resume(history: Vec<Message>) -> Self {
        let turns = history
            .iter()
            .filter(|m| !m.has_tool_requests())
            .filter_map(|m| {
                let text = m.text();
                (!text.is_empty()).then(|| match m.role {
                    Role::User => DisplayTurn::user(&text, &[]),
                    Role::Assistant => DisplayTurn::assistant(text, Vec::new()),
                })
            })
            .collect();
        Self {
            turns,
            history,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn turns(&self) -> &[DisplayTurn] {
        &self.turns
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Run one turn. On failure a single apology turn is shown, the backend
    /// history is left as it was and the error is returned for logging.
    pub async fn send(
        &mut self,
        agent: &Agent,
        ctx: &mut ToolContext,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<&DisplayTurn, AgentError> {
        self.turns.push(DisplayTurn::user(text, &attachments));

        let mut request = ConverseRequest::new(text)
            .with_attachments(attachments)
            .with_history(self.history.clone());
        request.model = self.model.clone();

        let result = agent.converse(ctx, request).await;
        let turn = match result {
            Ok(ConverseOutcome {
                text,
                auxiliary,
                history,
                ..
            }) => {
                self.history = history;
                DisplayTurn::assistant(text, auxiliary)
            }
            Err(e) => {
                error!(kind = e.kind(), "turn failed: {}", e);
                self.turns.push(DisplayTurn::apology());
                return Err(e);
            }
        };
        self.turns.push(turn);
        self.turns
            .last()
            .ok_or_else(|| AgentError::Internal("turn was not recorded".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolCall;
    use crate::providers::mock::MockProvider;
    use crate::tools::test_support::context;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_keeps_logs_in_step() {
        let agent = Agent::new(Box::new(MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("1", Ok(ToolCall::new("setYouTubeKey", json!({"apiKey": "yt"})))),
            Message::assistant().with_text("Saved your key"),
        ])));
        let mut ctx = context();
        let mut conversation = Conversation::new();

        let turn = conversation
            .send(&agent, &mut ctx, "Here is my YouTube key: yt", Vec::new())
            .await
            .unwrap();
        assert_eq!(turn.text, "Saved your key");
        assert_eq!(conversation.turns().len(), 2);
        assert_eq!(conversation.history().len(), 4);
    }

    #[tokio::test]
    async fn test_failure_adds_one_apology_and_keeps_history() {
        let agent = Agent::new(Box::new(MockProvider::with_results(vec![
            Ok(Message::assistant().with_text("First answer")),
            Err("connection reset".to_string()),
        ])));
        let mut ctx = context();
        let mut conversation = Conversation::new();

        conversation
            .send(&agent, &mut ctx, "one", Vec::new())
            .await
            .unwrap();
        let before = conversation.history().to_vec();

        let err = conversation
            .send(&agent, &mut ctx, "two", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
        assert_eq!(conversation.history(), before.as_slice());

        let turns = conversation.turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].text, "two");
        assert!(turns[3].error);
        assert_eq!(turns[3].text, APOLOGY);
    }

    #[test]
    fn test_resume_rebuilds_display_turns() {
        let history = vec![
            Message::user().with_text("Make a beat"),
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new("generateSequencerPattern", json!({"name": "Beat"}))),
            ),
            Message::user().with_tool_response("1", "generateSequencerPattern", Ok(vec![])),
            Message::assistant().with_text("Made one"),
        ];
        let conversation = Conversation::resume(history);
        let texts: Vec<_> = conversation.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["Make a beat", "Made one"]);
        assert_eq!(conversation.history().len(), 4);
    }
}
