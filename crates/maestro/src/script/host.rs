use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::capabilities::Console;
use super::interpreter::Interpreter;
use super::parser::parse;
use super::Capabilities;
use crate::errors::{AgentError, AgentResult};

const CONSOLE: &str = "console";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostState {
    Idle,
    Running,
}

/// A script failure shown to the user until dismissed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub message: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOutcome {
    /// Lines written with `console.log`
    pub logs: Vec<String>,
    /// Capability calls made
    pub calls: usize,
}

/// Compiles and runs scripts against the capabilities handed in per call
#[derive(Debug)]
pub struct ScriptHost {
    state: HostState,
    notices: Vec<Notice>,
    runs: u64,
    last_trigger: u64,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost {
    pub fn new() -> Self {
        Self {
            state: HostState::Idle,
            notices: Vec::new(),
            runs: 0,
            last_trigger: 0,
        }
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    /// Completed or failed executions
    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, id: &str) -> bool {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != id);
        self.notices.len() != before
    }

    /// Compile `body` and run it once. `console` is always available in
    /// addition to `capabilities`. Effects made before a runtime error stay.
    pub fn execute(
        &mut self,
        body: &str,
        capabilities: &mut Capabilities<'_>,
    ) -> AgentResult<ScriptOutcome> {
        let mut names = capabilities.names();
        names.push(CONSOLE);
        let program = parse(body, &names)?;

        self.state = HostState::Running;
        self.runs += 1;

        let mut console = Console::default();
        let result = {
            let mut interpreter = Interpreter::new(capabilities).with_console(&mut console);
            interpreter.run(&program).map(|_| interpreter.calls())
        };

        self.state = HostState::Idle;
        let calls = result?;
        Ok(ScriptOutcome {
            logs: console.into_lines(),
            calls,
        })
    }

    /// Entry point for the run trigger. Runs `body` once for a trigger value
    /// not seen before; errors and panics are logged and kept as notices.
    pub fn run_triggered(
        &mut self,
        trigger: u64,
        body: &str,
        capabilities: &mut Capabilities<'_>,
    ) -> Option<ScriptOutcome> {
        if trigger <= self.last_trigger {
            debug!(trigger, last = self.last_trigger, "run trigger already handled");
            return None;
        }
        self.last_trigger = trigger;

        let result = catch_unwind(AssertUnwindSafe(|| self.execute(body, capabilities)))
            .unwrap_or_else(|_| Err(AgentError::ScriptRuntime("script panicked".to_string())));
        self.state = HostState::Idle;

        match result {
            Ok(outcome) => {
                info!(trigger, calls = outcome.calls, "script run finished");
                Some(outcome)
            }
            Err(e) => {
                error!(trigger, "script run failed: {}", e);
                self.notices.push(Notice {
                    id: Uuid::new_v4().to_string(),
                    message: e.to_string(),
                    created: Utc::now(),
                });
                None
            }
        }
    }
}
