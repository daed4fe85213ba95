use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{required_text, ToolContext, ToolHandler};
use crate::errors::AgentResult;
use crate::models::content::Content;
use crate::models::tool::Tool;

fn key_schema(service: &str) -> Value {
    json!({
        "type": "object",
        "required": ["apiKey"],
        "properties": {
            "apiKey": {
                "type": "string",
                "description": format!("The {} API key.", service)
            }
        }
    })
}

pub struct SetElevenLabsKey;

#[async_trait]
impl ToolHandler for SetElevenLabsKey {
    fn tool(&self) -> Tool {
        Tool::new(
            "setElevenLabsKey",
            "Store the ElevenLabs API key used for voice cloning and premium speech.",
            key_schema("ElevenLabs"),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let key = required_text(&arguments, "apiKey")?;
        ctx.app.api_keys.elevenlabs = Some(key.to_string());
        info!("elevenlabs api key stored");
        Ok(vec![Content::text(
            "ElevenLabs API key saved. Voice cloning and premium speech are now available.",
        )])
    }
}

pub struct SetYouTubeKey;

#[async_trait]
impl ToolHandler for SetYouTubeKey {
    fn tool(&self) -> Tool {
        Tool::new(
            "setYouTubeKey",
            "Store the YouTube Data API key used for video search and analysis.",
            key_schema("YouTube Data"),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let key = required_text(&arguments, "apiKey")?;
        ctx.app.api_keys.youtube = Some(key.to_string());
        info!("youtube api key stored");
        Ok(vec![Content::text(
            "YouTube API key saved. Video search is now available.",
        )])
    }
}
