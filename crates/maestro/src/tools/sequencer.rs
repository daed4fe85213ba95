use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{optional_f64, optional_str, optional_u64, required_text, ToolContext, ToolHandler};
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::Tool;
use crate::state::{
    new_id, style_tracks, ArrangementSection, PatternTrack, SequencerPattern, SongArrangement,
    DEFAULT_STEPS, MAX_STEPS, MIN_STEPS,
};

const MAX_REPEATS: u64 = 64;

/// A track row given either as `"x..x"` or as an array of booleans or 0/1
fn parse_steps(value: &Value, steps: usize) -> AgentResult<Vec<bool>> {
    let mut row: Vec<bool> = match value {
        Value::String(grid) => grid
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '|')
            .map(|c| match c {
                'x' | 'X' | '1' | '*' => Ok(true),
                '.' | '-' | '0' | '_' => Ok(false),
                other => Err(AgentError::InvalidParameters(format!(
                    "Unexpected step '{}', use x for a hit and . for a rest",
                    other
                ))),
            })
            .collect::<AgentResult<_>>()?,
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Bool(on) => Ok(*on),
                Value::Number(n) => Ok(n.as_f64().map(|n| n != 0.0).unwrap_or(false)),
                other => Err(AgentError::InvalidParameters(format!(
                    "Unexpected step {}, use booleans or 0/1",
                    other
                ))),
            })
            .collect::<AgentResult<_>>()?,
        other => {
            return Err(AgentError::InvalidParameters(format!(
                "Track steps must be a string or an array, got {}",
                other
            )))
        }
    };
    row.resize(steps, false);
    Ok(row)
}

fn parse_tracks(value: &Value, steps: usize) -> AgentResult<Vec<PatternTrack>> {
    let items = value
        .as_array()
        .ok_or_else(|| AgentError::InvalidParameters("'tracks' must be an array".into()))?;
    items
        .iter()
        .map(|item| -> AgentResult<PatternTrack> {
            let instrument = item
                .get("instrument")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    AgentError::InvalidParameters("Every track needs an 'instrument'".into())
                })?;
            let row = item.get("steps").ok_or_else(|| {
                AgentError::InvalidParameters(format!("Track '{}' has no 'steps'", instrument))
            })?;
            Ok(PatternTrack {
                instrument: instrument.to_string(),
                steps: parse_steps(row, steps)?,
            })
        })
        .collect()
}

pub struct GenerateSequencerPattern;

#[async_trait]
impl ToolHandler for GenerateSequencerPattern {
    fn tool(&self) -> Tool {
        Tool::new(
            "generateSequencerPattern",
            "Create a step sequencer pattern. Give explicit `tracks`, or just a `style` \
            (house, techno, hiphop, rock, breakbeat) for a stock groove.",
            json!({
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": {"type": "string"},
                    "style": {"type": "string", "default": null},
                    "steps": {
                        "type": "integer",
                        "default": DEFAULT_STEPS,
                        "description": format!("Steps per bar, {} to {}.", MIN_STEPS, MAX_STEPS)
                    },
                    "tracks": {
                        "type": "array",
                        "default": null,
                        "items": {
                            "type": "object",
                            "required": ["instrument", "steps"],
                            "properties": {
                                "instrument": {"type": "string"},
                                "steps": {
                                    "type": ["string", "array"],
                                    "description": "\"x...x...\" or [1,0,0,0,...]"
                                }
                            }
                        }
                    }
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let name = required_text(&arguments, "name")?;
        let style = optional_str(&arguments, "style").unwrap_or("basic");
        let steps = optional_u64(&arguments, "steps")?.unwrap_or(DEFAULT_STEPS as u64) as usize;
        if !(MIN_STEPS..=MAX_STEPS).contains(&steps) {
            return Err(AgentError::InvalidParameters(format!(
                "steps must be between {} and {}",
                MIN_STEPS, MAX_STEPS
            )));
        }

        let tracks = match arguments.get("tracks").filter(|v| !v.is_null()) {
            Some(tracks) => parse_tracks(tracks, steps)?,
            None => style_tracks(style, steps),
        };
        if tracks.is_empty() {
            return Err(AgentError::InvalidParameters(
                "A pattern needs at least one track".into(),
            ));
        }

        let pattern = ctx.app.add_pattern(SequencerPattern {
            id: new_id(),
            name: name.to_string(),
            style: style.to_string(),
            steps,
            tracks,
        });
        info!(pattern = %pattern.name, steps, "sequencer pattern created");

        Ok(vec![
            Content::json(&json!({
                "id": pattern.id,
                "name": pattern.name,
                "steps": pattern.steps,
            })),
            Content::text(pattern.grid()),
        ])
    }
}

pub struct ListSequencerPatterns;

#[async_trait]
impl ToolHandler for ListSequencerPatterns {
    fn tool(&self) -> Tool {
        Tool::new(
            "listSequencerPatterns",
            "List the step sequencer patterns with their grids.",
            json!({"type": "object", "required": [], "properties": {}}),
        )
    }

    async fn call(&self, _arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        if ctx.app.patterns.is_empty() {
            return Ok(vec![Content::text("No patterns yet")]);
        }
        let listing = ctx
            .app
            .patterns
            .iter()
            .map(|p| format!("{} ({}, {} steps, id {})\n{}", p.name, p.style, p.steps, p.id, p.grid()))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(vec![Content::text(listing)])
    }
}

pub struct CreateSongArrangement;

#[async_trait]
impl ToolHandler for CreateSongArrangement {
    fn tool(&self) -> Tool {
        Tool::new(
            "createSongArrangement",
            "Arrange existing sequencer patterns into a song.",
            json!({
                "type": "object",
                "required": ["title", "sections"],
                "properties": {
                    "title": {"type": "string"},
                    "bpm": {"type": "number", "default": null, "description": "Defaults to the studio tempo."},
                    "sections": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["pattern"],
                            "properties": {
                                "pattern": {"type": "string", "description": "Pattern name or id."},
                                "name": {"type": "string", "default": null, "description": "e.g. intro, verse, chorus"},
                                "repeats": {"type": "integer", "default": 1}
                            }
                        }
                    }
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let title = required_text(&arguments, "title")?;
        let bpm = optional_f64(&arguments, "bpm")?
            .unwrap_or(ctx.app.bpm)
            .clamp(crate::state::MIN_BPM, crate::state::MAX_BPM);
        let items = arguments
            .get("sections")
            .and_then(|v| v.as_array())
            .filter(|items| !items.is_empty())
            .ok_or_else(|| {
                AgentError::InvalidParameters("'sections' must be a non-empty array".into())
            })?;

        let mut sections = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let reference = required_text(item, "pattern")?;
            let pattern = ctx.app.find_pattern(reference).ok_or_else(|| {
                AgentError::InvalidParameters(format!(
                    "No pattern named '{}', create it with generateSequencerPattern first",
                    reference
                ))
            })?;
            let repeats = optional_u64(item, "repeats")?.unwrap_or(1);
            if !(1..=MAX_REPEATS).contains(&repeats) {
                return Err(AgentError::InvalidParameters(format!(
                    "repeats must be between 1 and {}",
                    MAX_REPEATS
                )));
            }
            sections.push(ArrangementSection {
                name: optional_str(item, "name")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("section {}", i + 1)),
                pattern_id: pattern.id.clone(),
                repeats: repeats as u32,
            });
        }

        let arrangement = SongArrangement {
            id: new_id(),
            title: title.to_string(),
            bpm,
            sections,
        };
        let duration = arrangement.duration(&ctx.app.patterns);
        let arrangement = ctx.app.add_arrangement(arrangement);
        info!(title = %arrangement.title, duration, "song arrangement created");

        Ok(vec![Content::json(&json!({
            "arrangement": arrangement,
            "durationSeconds": (duration * 100.0).round() / 100.0,
        }))])
    }
}
