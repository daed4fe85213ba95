//! Dynamic Script Host
//!
//! Scripts are written in a small statement language:
//!
//! ```text
//! // comments run to the end of the line
//! let melody = "piano: c d e f g";
//! app.setBpm(96);
//! repeat 2 {
//!     runner.run("alda", melody);
//! }
//! console.log("done", app.state());
//! ```
//!
//! The only names a script can reach are the capabilities handed to the host
//! and the variables it binds itself with `let`. Everything else is rejected
//! before any statement runs. Nesting depth and the total work of one
//! execution are bounded, see [`MAX_NESTING`] and [`MAX_STEPS`].

pub mod capabilities;
pub mod host;
pub mod interpreter;
pub mod lexer;
pub mod parser;

pub use capabilities::{AppCapability, Console, RunnerCapability};
pub use host::{HostState, Notice, ScriptHost, ScriptOutcome};

use serde_json::Value;
use thiserror::Error;

use crate::errors::AgentError;

/// Largest accepted `repeat` count
pub const MAX_REPEAT: u64 = 1024;
/// Deepest nesting of blocks, brackets and calls a script may use
pub const MAX_NESTING: usize = 64;
/// Statements and expressions one execution may evaluate
pub const MAX_STEPS: usize = 100_000;
/// Console lines kept per execution
pub const MAX_CONSOLE_LINES: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("line {line}: {message}")]
    Compile { line: usize, message: String },

    #[error("line {line}: {message}")]
    Runtime { line: usize, message: String },
}

impl ScriptError {
    pub fn compile(line: usize, message: impl Into<String>) -> Self {
        ScriptError::Compile {
            line,
            message: message.into(),
        }
    }

    pub fn runtime(line: usize, message: impl Into<String>) -> Self {
        ScriptError::Runtime {
            line,
            message: message.into(),
        }
    }
}

impl From<ScriptError> for AgentError {
    fn from(err: ScriptError) -> Self {
        match &err {
            ScriptError::Compile { .. } => AgentError::ScriptCompile(err.to_string()),
            ScriptError::Runtime { .. } => AgentError::ScriptRuntime(err.to_string()),
        }
    }
}

/// Something a script can call as `name.method(args)`
pub trait Capability {
    fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Value, String>;
}

/// The named capabilities visible to one execution
pub struct Capabilities<'a> {
    entries: Vec<(&'static str, &'a mut dyn Capability)>,
}

impl Default for Capabilities<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Capabilities<'a> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `capability` under `name`, replacing any earlier one
    pub fn with(mut self, name: &'static str, capability: &'a mut dyn Capability) -> Self {
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, capability));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    pub fn invoke(&mut self, name: &str, method: &str, args: Vec<Value>) -> Option<Result<Value, String>> {
        self.entries
            .iter_mut()
            .find(|(existing, _)| *existing == name)
            .map(|(_, capability)| capability.invoke(method, args))
    }
}

/// Number argument at `index`
pub(crate) fn number_arg(args: &[Value], index: usize, what: &str) -> Result<f64, String> {
    args.get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("argument {} ({}) must be a number", index + 1, what))
}

/// String argument at `index`
pub(crate) fn string_arg<'v>(args: &'v [Value], index: usize, what: &str) -> Result<&'v str, String> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("argument {} ({}) must be a string", index + 1, what))
}
