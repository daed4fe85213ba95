use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::engraving::{engrave, Clef};
use super::{optional_str, optional_u64, required_text, ToolContext, ToolHandler};
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::role::Role;
use crate::models::tool::Tool;
use crate::services::sheet_music::SheetMusicReading;
use crate::services::video::{DEFAULT_MAX_RESULTS, MAX_RESULTS_LIMIT};

fn youtube_key(ctx: &ToolContext) -> AgentResult<String> {
    ctx.app.api_keys.youtube.clone().ok_or_else(|| {
        AgentError::InvalidParameters(
            "No YouTube API key is set, ask the user for one and call setYouTubeKey".into(),
        )
    })
}

pub struct SearchVideos;

#[async_trait]
impl ToolHandler for SearchVideos {
    fn tool(&self) -> Tool {
        Tool::new(
            "searchVideos",
            "Search YouTube for videos, e.g. tutorials or performances. Requires a YouTube API key.",
            json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {"type": "string"},
                    "maxResults": {
                        "type": "integer",
                        "default": DEFAULT_MAX_RESULTS,
                        "description": format!("1 to {}.", MAX_RESULTS_LIMIT)
                    }
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let query = required_text(&arguments, "query")?;
        let max_results = optional_u64(&arguments, "maxResults")?
            .unwrap_or(DEFAULT_MAX_RESULTS as u64)
            .clamp(1, MAX_RESULTS_LIMIT as u64) as u32;
        let api_key = youtube_key(ctx)?;

        let videos = ctx.services.video.search(query, max_results, &api_key).await?;
        if videos.is_empty() {
            return Ok(vec![Content::text(format!("No videos found for '{}'", query))]);
        }
        Ok(vec![Content::json(&json!(videos))])
    }
}

pub struct AnalyzeVideo;

#[async_trait]
impl ToolHandler for AnalyzeVideo {
    fn tool(&self) -> Tool {
        Tool::new(
            "analyzeVideo",
            "Fetch details of one YouTube video: title, channel, description, duration, statistics and tags.",
            json!({
                "type": "object",
                "required": ["videoId"],
                "properties": {
                    "videoId": {"type": "string"}
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let video_id = required_text(&arguments, "videoId")?;
        let api_key = youtube_key(ctx)?;
        let details = ctx.services.video.analyze(video_id, &api_key).await?;
        Ok(vec![Content::json(&json!(details))])
    }
}

pub struct ReadSheetMusic;

#[async_trait]
impl ToolHandler for ReadSheetMusic {
    fn tool(&self) -> Tool {
        Tool::new(
            "readSheetMusic",
            "Read a score the user attached. Without `attachment` the only attached image is used.",
            json!({
                "type": "object",
                "required": [],
                "properties": {
                    "attachment": {"type": "string", "default": null, "description": "File name of the attachment."}
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let attachment = match optional_str(&arguments, "attachment") {
            Some(name) => ctx.attachment(name).ok_or_else(|| {
                AgentError::InvalidParameters(format!("No attachment named '{}'", name))
            })?,
            None => {
                let mut images = ctx.attachments.iter().filter(|a| a.is_image());
                match (images.next(), images.next()) {
                    (Some(only), None) => only,
                    (None, _) => {
                        return Err(AgentError::InvalidParameters(
                            "No score is attached".into(),
                        ))
                    }
                    _ => {
                        return Err(AgentError::InvalidParameters(
                            "Several images are attached, name the one to read".into(),
                        ))
                    }
                }
            }
        };

        match ctx.services.sheet_music.read(attachment).await? {
            reading @ SheetMusicReading::Transcribed { .. } => Ok(vec![Content::json(&json!(reading))]),
            SheetMusicReading::Attached { name, .. } => Ok(vec![Content::text(format!(
                "No score reader is configured. {} is attached to the user's message, \
                read the notes from the image directly.",
                name
            ))]),
        }
    }
}

pub struct SearchSheetMusic;

#[async_trait]
impl ToolHandler for SearchSheetMusic {
    fn tool(&self) -> Tool {
        Tool::new(
            "searchSheetMusic",
            "Search a sheet music catalogue by title or composer.",
            json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {"type": "string"}
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let query = required_text(&arguments, "query")?;
        let results = ctx.services.sheet_music.search(query).await?;
        Ok(vec![Content::json(&json!(results))])
    }
}

pub struct GenerateSheetMusic;

#[async_trait]
impl ToolHandler for GenerateSheetMusic {
    fn tool(&self) -> Tool {
        Tool::new(
            "generateSheetMusic",
            "Engrave notes as sheet music and show it to the user. Notes are written like \
            `c4`, `f#5/8` or `bb3/2` (letter, optional # or b, octave, optional /duration \
            of 1, 2, 4, 8 or 16), and `r/4` is a rest.",
            json!({
                "type": "object",
                "required": ["title", "notes"],
                "properties": {
                    "title": {"type": "string"},
                    "notes": {
                        "type": ["array", "string"],
                        "items": {"type": "string"},
                        "description": "Notes in order, as an array or a space separated string."
                    },
                    "clef": {"type": "string", "enum": ["treble", "bass"], "default": "treble"}
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, _ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let title = required_text(&arguments, "title")?;
        let notes: Vec<String> = match arguments.get("notes") {
            Some(Value::String(line)) => line.split_whitespace().map(str::to_string).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => {
                return Err(AgentError::InvalidParameters(
                    "Missing 'notes' parameter".into(),
                ))
            }
        };
        let clef = match optional_str(&arguments, "clef") {
            Some(clef) => Clef::from_str(clef.trim())
                .map_err(|_| AgentError::InvalidParameters(format!("Unknown clef '{}'", clef)))?,
            None => Clef::default(),
        };

        let svg = engrave(title, &notes, clef)?;
        Ok(vec![
            Content::text(format!(
                "Engraved {} notes of '{}' on a {} staff and showed the score to the user.",
                notes.len(),
                title,
                clef
            )),
            Content::image(svg, "image/svg+xml").with_audience(vec![Role::User]),
        ])
    }
}
