use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{required_str, ToolContext, ToolHandler};
use crate::audio::Waveform;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::Tool;
use crate::state::PAD_COUNT;

const PAD_FIELDS: [&str; 5] = ["label", "sound", "frequency", "waveform", "volume"];

pub struct ConfigureDrumPad;

impl ConfigureDrumPad {
    /// Pads are numbered 1..=16 for the assistant, or named by label
    fn pad_index(ctx: &ToolContext, pad: &Value) -> AgentResult<usize> {
        if let Some(number) = pad.as_u64() {
            if (1..=PAD_COUNT as u64).contains(&number) {
                return Ok(number as usize - 1);
            }
            return Err(AgentError::InvalidParameters(format!(
                "Pad {} does not exist, pads are numbered 1 to {}",
                number, PAD_COUNT
            )));
        }
        if let Some(label) = pad.as_str() {
            return ctx
                .app
                .pads
                .iter()
                .position(|p| p.label.eq_ignore_ascii_case(label.trim()))
                .ok_or_else(|| AgentError::InvalidParameters(format!("No pad labelled '{}'", label)));
        }
        Err(AgentError::InvalidParameters(
            "Missing 'pad' parameter".into(),
        ))
    }
}

#[async_trait]
impl ToolHandler for ConfigureDrumPad {
    fn tool(&self) -> Tool {
        let waveforms: Vec<String> = Waveform::OSCILLATORS
            .iter()
            .chain(std::iter::once(&Waveform::Noise))
            .map(|w| w.to_string())
            .collect();
        Tool::new(
            "configureDrumPad",
            "Change one of the 16 drum pads. Only the given fields change.",
            json!({
                "type": "object",
                "required": ["pad"],
                "properties": {
                    "pad": {
                        "type": ["integer", "string"],
                        "description": "Pad number from 1 to 16, or its current label."
                    },
                    "label": {"type": "string", "default": null},
                    "sound": {"type": "string", "default": null, "description": "Sample or synth name."},
                    "frequency": {"type": "number", "default": null, "description": "Pitch in Hz."},
                    "waveform": {"type": "string", "enum": waveforms, "default": null},
                    "volume": {"type": "number", "default": null, "description": "0 to 1."}
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let pad = arguments
            .get("pad")
            .ok_or_else(|| AgentError::InvalidParameters("Missing 'pad' parameter".into()))?;
        let index = Self::pad_index(ctx, pad)?;

        let config: Map<String, Value> = PAD_FIELDS
            .iter()
            .filter_map(|field| {
                arguments
                    .get(*field)
                    .filter(|v| !v.is_null())
                    .map(|v| (field.to_string(), v.clone()))
            })
            .collect();
        if config.is_empty() {
            return Err(AgentError::InvalidParameters(format!(
                "Nothing to change, give at least one of {}",
                PAD_FIELDS.join(", ")
            )));
        }

        let pad = ctx.app.configure_pad(index, &Value::Object(config))?;
        Ok(vec![Content::json(&json!({
            "pad": index + 1,
            "config": pad,
        }))])
    }
}

pub struct UpdateEffect;

#[async_trait]
impl ToolHandler for UpdateEffect {
    fn tool(&self) -> Tool {
        Tool::new(
            "updateEffect",
            "Set an effect parameter. Values outside the parameter's range are clamped. \
            reverb: mix, decay. delay: time, feedback, mix. distortion: amount, mix. \
            filter: cutoff, resonance. compressor: threshold, ratio, attack, release.",
            json!({
                "type": "object",
                "required": ["effect", "parameter", "value"],
                "properties": {
                    "effect": {
                        "type": "string",
                        "enum": ["reverb", "delay", "distortion", "filter", "compressor"]
                    },
                    "parameter": {"type": "string"},
                    "value": {"type": "number"}
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let effect = required_str(&arguments, "effect")?;
        let parameter = required_str(&arguments, "parameter")?;
        let value = arguments
            .get("value")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| AgentError::InvalidParameters("Missing 'value' parameter".into()))?;

        let stored = ctx.app.set_effect(effect, parameter, value)?;
        let mut message = format!("{} {} set to {}", effect, parameter, stored);
        if stored != value {
            message.push_str(&format!(" (clamped from {})", value));
        }
        Ok(vec![Content::text(message)])
    }
}
