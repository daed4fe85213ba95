use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use maestro::agent::Agent;
use maestro::audio::{MixBus, PolyglotRunner};
use maestro::conversation::{Conversation, APOLOGY};
use maestro::models::message::{Message, MessageContent};
use maestro::models::role::Role;
use maestro::models::tool::{Tool, ToolCall};
use maestro::providers::base::{Provider, Usage};
use maestro::providers::configs::OpenAiProviderConfig;
use maestro::providers::openai::OpenAiProvider;
use maestro::services::Services;
use maestro::state::View;
use maestro::tools::ToolContext;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replays canned replies in order
struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<Message, String>>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<Message, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _model: &str,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(message)) => Ok((message, Usage::default())),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Err(anyhow!("no scripted reply left")),
        }
    }
}

fn call(id: &str, name: &str, arguments: Value) -> MessageContent {
    MessageContent::tool_request(id, Ok(ToolCall::new(name, arguments)))
}

fn studio() -> ToolContext {
    let runner = PolyglotRunner::with_seed(Box::new(|| MixBus::new(8_000)), 7);
    ToolContext::new(runner, Services::default())
}

#[tokio::test]
async fn test_a_session_builds_a_song() {
    let provider = ScriptedProvider::new(vec![
        Ok(Message::assistant()
            .with_content(call("1", "navigate", json!({"view": "sequencer"})))
            .with_content(call(
                "2",
                "generateSequencerPattern",
                json!({"name": "Boom Bap", "style": "hiphop"}),
            ))),
        Ok(Message::assistant().with_content(call(
            "3",
            "createSongArrangement",
            json!({"title": "Demo", "bpm": 120, "sections": [{"pattern": "boom bap", "repeats": 2}]}),
        ))),
        Ok(Message::assistant().with_text("Your demo is two bars of boom bap.")),
        Ok(Message::assistant()
            .with_content(call(
                "4",
                "updateCodeLab",
                json!({"language": "alda", "code": "piano: c e g"}),
            ))
            .with_content(call("5", "runCodeLab", json!({})))),
        Ok(Message::assistant().with_text("Played a C major arpeggio.")),
    ]);
    let agent = Agent::new(Box::new(provider));
    let mut ctx = studio();
    let mut conversation = Conversation::new();

    let turn = conversation
        .send(&agent, &mut ctx, "Make me a boom bap demo", Vec::new())
        .await
        .unwrap();
    assert_eq!(turn.text, "Your demo is two bars of boom bap.");
    assert_eq!(ctx.app.view, View::Sequencer);
    assert_eq!(ctx.app.patterns.len(), 1);
    let arrangement = &ctx.app.arrangements[0];
    assert_eq!(arrangement.sections[0].repeats, 2);
    assert!((arrangement.duration(&ctx.app.patterns) - 4.0).abs() < 1e-9);

    conversation
        .send(&agent, &mut ctx, "Now play an arpeggio", Vec::new())
        .await
        .unwrap();
    assert_eq!(ctx.app.code_lab.trigger.value(), 1);
    assert_eq!(ctx.runner.scheduler().map(|s| s.scheduled_count()), Some(3));

    // user, 2 tool rounds of request + results, reply; then user, 1 round, reply
    assert_eq!(conversation.history().len(), 6 + 4);
    assert_eq!(conversation.turns().len(), 4);
}

#[tokio::test]
async fn test_failed_turn_apologises_once() {
    let agent = Agent::new(Box::new(ScriptedProvider::new(vec![Err(
        "upstream unavailable".to_string(),
    )])));
    let mut ctx = studio();
    let mut conversation = Conversation::new();

    assert!(conversation
        .send(&agent, &mut ctx, "hello?", Vec::new())
        .await
        .is_err());

    let turns = conversation.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].text, APOLOGY);
    assert!(conversation.history().is_empty());
}

#[tokio::test]
async fn test_openai_round_trip_keeps_scores_from_the_model() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "generateSheetMusic",
                            "arguments": "{\"title\":\"Ode\",\"notes\":\"e4 e4 f4 g4\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Here is the opening of Ode to Joy."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 30, "completion_tokens": 9, "total_tokens": 39}
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(OpenAiProviderConfig {
        host: mock_server.uri(),
        api_key: "test_api_key".to_string(),
        model: "gpt-4o".to_string(),
        temperature: None,
        max_tokens: None,
    })
    .unwrap();
    let agent = Agent::new(Box::new(provider));
    let mut ctx = studio();
    let mut conversation = Conversation::new();

    let turn = conversation
        .send(&agent, &mut ctx, "Write out Ode to Joy", Vec::new())
        .await
        .unwrap()
        .clone();
    assert_eq!(turn.text, "Here is the opening of Ode to Joy.");
    let (svg, mime_type) = turn.auxiliary[0].as_image().unwrap();
    assert_eq!(mime_type, "image/svg+xml");
    assert!(svg.contains("<svg"));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let sent = second["messages"].to_string();
    assert!(sent.contains("Engraved 4 notes"));
    assert!(!sent.contains("<svg"));
    assert!(second["tools"]
        .as_array()
        .unwrap()
        .iter()
        .any(|tool| tool["function"]["name"] == "generateSheetMusic"));
}
