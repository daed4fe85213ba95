use serde_json::{json, Value};
use tracing::info;

use super::{number_arg, string_arg, Capability, MAX_CONSOLE_LINES};
use crate::audio::PolyglotRunner;
use crate::state::AppState;

/// `runner.run(language, source)` and `runner.languages()`
pub struct RunnerCapability<'a>(pub &'a mut PolyglotRunner);

impl Capability for RunnerCapability<'_> {
    fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Value, String> {
        match method {
            "run" => {
                let language = string_arg(&args, 0, "language")?;
                let source = string_arg(&args, 1, "source")?;
                let report = self.0.run(language, source).map_err(|e| e.to_string())?;
                Ok(json!({
                    "events": report.scheduled(),
                    "warning": report.warning,
                }))
            }
            "languages" => Ok(json!(self.0.languages())),
            other => Err(format!("unknown method `{}`", other)),
        }
    }
}

/// Studio state: navigation, pads, effects, Code Lab contents and tempo
pub struct AppCapability<'a>(pub &'a mut AppState);

impl Capability for AppCapability<'_> {
    fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Value, String> {
        let state = &mut *self.0;
        match method {
            "navigate" => {
                let view = state
                    .navigate(string_arg(&args, 0, "view")?)
                    .map_err(|e| e.to_string())?;
                Ok(json!(view))
            }
            "setPad" => {
                let index = number_arg(&args, 0, "pad index")?;
                if index < 0.0 || index.fract() != 0.0 {
                    return Err("pad index must be a whole number".to_string());
                }
                let config = args.get(1).cloned().unwrap_or_else(|| json!({}));
                let pad = state
                    .configure_pad(index as usize, &config)
                    .map_err(|e| e.to_string())?;
                Ok(json!(pad))
            }
            "setEffect" => {
                let effect = string_arg(&args, 0, "effect")?;
                let parameter = string_arg(&args, 1, "parameter")?;
                let value = number_arg(&args, 2, "value")?;
                let stored = state
                    .set_effect(effect, parameter, value)
                    .map_err(|e| e.to_string())?;
                Ok(json!(stored))
            }
            "setCodeLab" => {
                let language = string_arg(&args, 0, "language")?;
                let code = string_arg(&args, 1, "code")?;
                state.set_code_lab(language, code);
                Ok(Value::Null)
            }
            "setBpm" => {
                let bpm = state
                    .set_bpm(number_arg(&args, 0, "bpm")?)
                    .map_err(|e| e.to_string())?;
                Ok(json!(bpm))
            }
            "state" => Ok(state.snapshot()),
            other => Err(format!("unknown method `{}`", other)),
        }
    }
}

/// `console.log(...)`; lines are traced, and the first [`MAX_CONSOLE_LINES`]
/// are kept for the caller
#[derive(Debug, Default)]
pub struct Console {
    lines: Vec<String>,
    omitted: usize,
}

impl Console {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines logged after the console filled up
    pub fn omitted(&self) -> usize {
        self.omitted
    }

    pub fn into_lines(mut self) -> Vec<String> {
        if self.omitted > 0 {
            self.lines.push(format!("({} more lines omitted)", self.omitted));
        }
        self.lines
    }
}

impl Capability for Console {
    fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Value, String> {
        match method {
            "log" | "info" => {
                let line = args
                    .iter()
                    .map(|arg| match arg {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                info!(target: "maestro::script", "{}", line);
                if self.lines.len() < MAX_CONSOLE_LINES {
                    self.lines.push(line);
                } else {
                    self.omitted += 1;
                }
                Ok(Value::Null)
            }
            other => Err(format!("unknown method `{}`", other)),
        }
    }
}
