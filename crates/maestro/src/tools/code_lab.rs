use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::{required_str, required_text, ToolContext, ToolHandler};
use crate::audio::Dialect;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::Tool;
use crate::script::{AppCapability, Capabilities, RunnerCapability, ScriptOutcome};
use crate::state::{TriggeredRun, SCRIPT_LANGUAGE};

/// Result of one triggered Code Lab run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeLabRun {
    pub ticket: u64,
    pub language: String,
    /// Sounds scheduled by a DSL run
    pub events: usize,
    /// Seconds until everything scheduled has played
    pub seconds: f64,
    /// Console output of a script run
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolContext {
    /// Run a script once against the studio and the runner
    pub fn execute_script(&mut self, body: &str) -> AgentResult<ScriptOutcome> {
        let ToolContext {
            app, runner, host, ..
        } = self;
        let mut app = AppCapability(app);
        let mut runner = RunnerCapability(runner);
        let mut capabilities = Capabilities::new()
            .with("app", &mut app)
            .with("runner", &mut runner);
        host.execute(body, &mut capabilities)
    }

    /// Perform every run the Code Lab trigger has queued, oldest first
    pub fn run_code_lab(&mut self) -> Vec<CodeLabRun> {
        let queued = self.app.code_lab.trigger.drain();
        queued.into_iter().map(|run| self.run_queued(run)).collect()
    }

    fn run_queued(&mut self, run: TriggeredRun) -> CodeLabRun {
        let mut result = CodeLabRun {
            ticket: run.ticket,
            language: run.language.clone(),
            ..Default::default()
        };

        if run.language.eq_ignore_ascii_case(SCRIPT_LANGUAGE) {
            let ToolContext {
                app, runner, host, ..
            } = self;
            let notices = host.notices().len();
            let mut app = AppCapability(app);
            let mut runner = RunnerCapability(runner);
            let mut capabilities = Capabilities::new()
                .with("app", &mut app)
                .with("runner", &mut runner);
            match host.run_triggered(run.ticket, &run.code, &mut capabilities) {
                Some(outcome) => result.logs = outcome.logs,
                None => {
                    result.error = Some(
                        host.notices()
                            .get(notices)
                            .map(|notice| notice.message.clone())
                            .unwrap_or_else(|| format!("run {} was already handled", run.ticket)),
                    )
                }
            }
            return result;
        }

        match self.runner.run(&run.language, &run.code) {
            Ok(report) => {
                result.events = report.scheduled();
                result.seconds = (report.end - report.epoch).max(0.0);
                result.warning = report.warning;
            }
            Err(e) => result.error = Some(e.to_string()),
        }
        result
    }
}

fn supported(language: &str) -> bool {
    language.eq_ignore_ascii_case(SCRIPT_LANGUAGE) || Dialect::for_tag(language).is_some()
}

pub struct UpdateCodeLab;

#[async_trait]
impl ToolHandler for UpdateCodeLab {
    fn tool(&self) -> Tool {
        let mut languages = Dialect::tags();
        languages.push(SCRIPT_LANGUAGE);
        Tool::new(
            "updateCodeLab",
            format!(
                "Replace the Code Lab contents. Languages: {}. Music languages: alda (`piano: c d e`), \
                sonic-pi (`play 60` / `sleep 0.5`), strudel or tidal (`s \"bd ~ sn\"`). \
                `script` runs studio commands such as `app.setBpm(90)` and \
                `runner.run(\"alda\", \"piano: c e g\")`, with `let`, `repeat N {{ }}` and `console.log`.",
                languages.join(", ")
            ),
            json!({
                "type": "object",
                "required": ["language", "code"],
                "properties": {
                    "language": {"type": "string"},
                    "code": {"type": "string"}
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let language = required_text(&arguments, "language")?;
        let code = required_str(&arguments, "code")?;
        ctx.app.set_code_lab(language, code);

        let mut message = format!(
            "Code Lab updated ({} lines of {}).",
            code.lines().count(),
            language
        );
        if !supported(language) {
            message.push_str(&format!(
                " {} is not a supported language, running it will only produce a warning.",
                language
            ));
        }
        Ok(vec![Content::text(message)])
    }
}

pub struct RunCodeLab;

#[async_trait]
impl ToolHandler for RunCodeLab {
    fn tool(&self) -> Tool {
        Tool::new(
            "runCodeLab",
            "Run the current Code Lab contents once.",
            json!({"type": "object", "required": [], "properties": {}}),
        )
    }

    async fn call(&self, _arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        if ctx.app.code_lab.code.trim().is_empty() {
            return Err(AgentError::InvalidParameters(
                "The Code Lab is empty, call updateCodeLab first".into(),
            ));
        }

        let ticket = ctx.app.trigger_code_lab();
        let runs = ctx.run_code_lab();
        info!(ticket, runs = runs.len(), "code lab triggered");

        match runs.iter().find(|run| run.ticket == ticket) {
            Some(CodeLabRun {
                error: Some(error), ..
            }) => Err(AgentError::ExecutionError(error.clone())),
            Some(run) => Ok(vec![Content::json(&json!(run))]),
            None => Err(AgentError::Internal(format!(
                "run {} was not performed",
                ticket
            ))),
        }
    }
}

pub struct ExecuteScript;

#[async_trait]
impl ToolHandler for ExecuteScript {
    fn tool(&self) -> Tool {
        Tool::new(
            "executeScript",
            "Run a studio script right away. Capabilities: `app` (navigate, setPad, setEffect, \
            setCodeLab, setBpm, state), `runner` (run, languages) and `console` (log). \
            Statements: `let x = ...`, `repeat N { ... }` and method calls.",
            json!({
                "type": "object",
                "required": ["script"],
                "properties": {
                    "script": {"type": "string"}
                }
            }),
        )
    }

    async fn call(&self, arguments: Value, ctx: &mut ToolContext) -> AgentResult<Vec<Content>> {
        let script = required_text(&arguments, "script")?;
        let outcome = ctx.execute_script(script)?;
        Ok(vec![Content::json(&json!(outcome))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{context, json, text};

    #[tokio::test]
    async fn test_update_and_run_dsl() {
        let mut ctx = context();
        let result = UpdateCodeLab
            .call(json!({"language": "Alda", "code": "piano: c d"}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(text(&result), "Code Lab updated (1 lines of Alda).");

        let run = json(&RunCodeLab.call(json!({}), &mut ctx).await.unwrap());
        assert_eq!(run["ticket"], 1);
        assert_eq!(run["events"], 2);
        assert_eq!(ctx.app.code_lab.trigger.value(), 1);
        assert_eq!(ctx.runner.scheduler().map(|s| s.scheduled_count()), Some(2));
    }

    #[tokio::test]
    async fn test_unsupported_language_warns() {
        let mut ctx = context();
        let result = UpdateCodeLab
            .call(json!({"language": "basic", "code": "10 PRINT"}), &mut ctx)
            .await
            .unwrap();
        assert!(text(&result).contains("not a supported language"));

        let run = json(&RunCodeLab.call(json!({}), &mut ctx).await.unwrap());
        assert_eq!(run["events"], 0);
        assert_eq!(run["warning"], "Unsupported language: basic");
        assert!(ctx.runner.bus().is_none());
    }

    #[tokio::test]
    async fn test_run_script_through_trigger() {
        let mut ctx = context();
        UpdateCodeLab
            .call(
                json!({"language": "script", "code": "app.setBpm(96)\nconsole.log(\"ok\")"}),
                &mut ctx,
            )
            .await
            .unwrap();
        let run = json(&RunCodeLab.call(json!({}), &mut ctx).await.unwrap());
        assert_eq!(run["logs"], json!(["ok"]));
        assert_eq!(ctx.app.bpm, 96.0);
        assert_eq!(ctx.host.runs(), 1);

        ctx.app.set_code_lab("script", "app.fly()");
        let err = RunCodeLab.call(json!({}), &mut ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::ExecutionError(m) if m.contains("unknown method `fly`")));
        assert_eq!(ctx.host.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_every_increment_runs_its_own_code() {
        let mut ctx = context();
        for (i, code) in ["piano: c", "piano: c d", "piano: c d e"].iter().enumerate() {
            ctx.app.set_code_lab("alda", code);
            assert_eq!(ctx.app.trigger_code_lab(), i as u64 + 1);
        }
        ctx.app.set_code_lab("alda", "piano: c d e f g");

        let runs = ctx.run_code_lab();
        let events: Vec<_> = runs.iter().map(|r| (r.ticket, r.events)).collect();
        assert_eq!(events, [(1, 1), (2, 2), (3, 3)]);
        assert!(ctx.run_code_lab().is_empty());
    }

    #[tokio::test]
    async fn test_empty_code_lab_and_execute_script() {
        let mut ctx = context();
        let err = RunCodeLab.call(json!({}), &mut ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));
        assert_eq!(ctx.app.code_lab.trigger.value(), 0);

        let outcome = json(
            &ExecuteScript
                .call(
                    json!({"script": "repeat 2 { runner.run(\"sonic-pi\", \"play 60\") }\napp.navigate(\"code-lab\")"}),
                    &mut ctx,
                )
                .await
                .unwrap(),
        );
        assert_eq!(outcome["calls"], 3);
        assert_eq!(ctx.runner.scheduler().map(|s| s.scheduled_count()), Some(2));

        let err = ExecuteScript
            .call(json!({"script": "window.alert(1)"}), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ScriptCompile(_)));
    }
}
