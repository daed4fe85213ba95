use std::collections::HashMap;

use serde_json::{Map, Value};

use super::capabilities::Console;
use super::parser::{Expr, Program, Stmt};
use super::{Capabilities, Capability, ScriptError, MAX_REPEAT, MAX_STEPS};

type Result<T> = std::result::Result<T, ScriptError>;

/// Walks a compiled program, routing calls to the capabilities
pub struct Interpreter<'c, 'a> {
    capabilities: &'c mut Capabilities<'a>,
    console: Option<&'c mut Console>,
    scopes: Vec<HashMap<String, Value>>,
    calls: usize,
    steps: usize,
    max_steps: usize,
}

impl<'c, 'a> Interpreter<'c, 'a> {
    pub fn new(capabilities: &'c mut Capabilities<'a>) -> Self {
        Self {
            capabilities,
            console: None,
            scopes: vec![HashMap::new()],
            calls: 0,
            steps: 0,
            max_steps: MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Serve `console` calls from `console`
    pub fn with_console(mut self, console: &'c mut Console) -> Self {
        self.console = Some(console);
        self
    }

    /// Capability calls made so far
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Statements and expressions evaluated so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn step(&mut self, line: usize) -> Result<()> {
        if self.steps >= self.max_steps {
            return Err(ScriptError::runtime(
                line,
                format!("script took more than {} steps", self.max_steps),
            ));
        }
        self.steps += 1;
        Ok(())
    }

    pub fn run(&mut self, program: &Program) -> Result<()> {
        self.block(&program.statements)
    }

    fn block(&mut self, statements: &[Stmt]) -> Result<()> {
        for statement in statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Stmt) -> Result<()> {
        self.step(statement.line())?;
        match statement {
            Stmt::Let { name, value, line } => {
                let value = self.eval(value, *line)?;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone(), value);
                }
            }
            Stmt::Repeat { count, body, line } => {
                let count = self.eval(count, *line)?;
                let times = count
                    .as_f64()
                    .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= MAX_REPEAT as f64)
                    .ok_or_else(|| {
                        ScriptError::runtime(
                            *line,
                            format!(
                                "repeat count must be a whole number from 0 to {}, got {}",
                                MAX_REPEAT, count
                            ),
                        )
                    })? as u64;
                for _ in 0..times {
                    self.scopes.push(HashMap::new());
                    let result = self.block(body);
                    self.scopes.pop();
                    result?;
                }
            }
            Stmt::Expr { expr, line } => {
                self.eval(expr, *line)?;
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn eval(&mut self, expr: &Expr, line: usize) -> Result<Value> {
        self.step(line)?;
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| ScriptError::runtime(line, format!("`{}` is not defined", name))),
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item, line))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Expr::Object(fields) => {
                let mut map = Map::new();
                for (key, value) in fields {
                    map.insert(key.clone(), self.eval(value, line)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Call {
                receiver,
                method,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, line))
                    .collect::<Result<Vec<_>>>()?;
                self.calls += 1;
                let result = match self.console.as_mut() {
                    Some(console) if receiver == "console" => Some(console.invoke(method, args)),
                    _ => self.capabilities.invoke(receiver, method, args),
                };
                match result {
                    Some(Ok(value)) => Ok(value),
                    Some(Err(message)) => Err(ScriptError::runtime(
                        line,
                        format!("{}.{}: {}", receiver, method, message),
                    )),
                    None => Err(ScriptError::runtime(
                        line,
                        format!("capability `{}` is not available", receiver),
                    )),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse;
    use crate::script::Capability;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(String, Vec<Value>)>,
    }

    impl Capability for Recorder {
        fn invoke(&mut self, method: &str, args: Vec<Value>) -> std::result::Result<Value, String> {
            if method == "fail" {
                return Err("asked to fail".to_string());
            }
            self.calls.push((method.to_string(), args));
            Ok(json!(self.calls.len()))
        }
    }

    fn run(source: &str, recorder: &mut Recorder) -> Result<usize> {
        let mut caps = Capabilities::new().with("rec", recorder);
        let program = parse(source, &caps.names())?;
        let mut interpreter = Interpreter::new(&mut caps);
        interpreter.run(&program)?;
        Ok(interpreter.calls())
    }

    #[test]
    fn test_repeat_and_variables() {
        let mut recorder = Recorder::default();
        let calls = run(
            "let n = rec.count()\nrepeat 3 { let x = [n, {k: n}]; rec.note(x) }",
            &mut recorder,
        )
        .unwrap();

        assert_eq!(calls, 4);
        assert_eq!(recorder.calls.len(), 4);
        assert_eq!(recorder.calls[3].1, vec![json!([1, {"k": 1}])]);
    }

    #[test]
    fn test_effects_before_error_persist() {
        let mut recorder = Recorder::default();
        let err = run("rec.a()\nrec.b()\nrec.fail()\nrec.c()", &mut recorder).unwrap_err();
        assert_eq!(
            err,
            ScriptError::runtime(3, "rec.fail: asked to fail".to_string())
        );
        let methods: Vec<_> = recorder.calls.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(methods, ["a", "b"]);
    }

    #[test]
    fn test_repeat_bounds() {
        let mut recorder = Recorder::default();
        assert!(run("repeat 0 { rec.a() }", &mut recorder).is_ok());
        assert!(recorder.calls.is_empty());

        for bad in ["repeat 1.5 { }", "repeat -1 { }", "repeat 1025 { }", "repeat \"2\" { }"] {
            let err = run(bad, &mut recorder).unwrap_err();
            assert!(matches!(err, ScriptError::Runtime { line: 1, .. }), "{bad}");
        }
    }

    #[test]
    fn test_nested_repeats_run_out_of_steps() {
        let mut recorder = Recorder::default();
        let err = run(
            "repeat 1024 {\n repeat 1024 {\n  repeat 1024 { rec.tick() }\n }\n}",
            &mut recorder,
        )
        .unwrap_err();
        match err {
            ScriptError::Runtime { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("more than 100000 steps"));
            }
            other => panic!("expected a runtime error, got {:?}", other),
        }
        assert!(!recorder.calls.is_empty());
        assert!(recorder.calls.len() < MAX_STEPS);
    }

    #[test]
    fn test_step_budget_counts_statements_and_expressions() {
        let mut recorder = Recorder::default();
        let mut caps = Capabilities::new().with("rec", &mut recorder);
        let program = parse("let x = [1, 2]\nrec.a(x)", &caps.names()).unwrap();

        let mut interpreter = Interpreter::new(&mut caps);
        interpreter.run(&program).unwrap();
        // two statements, the array and its items, the call and its argument
        assert_eq!(interpreter.steps(), 7);

        let mut limited = Interpreter::new(&mut caps).with_max_steps(6);
        assert!(matches!(
            limited.run(&program),
            Err(ScriptError::Runtime { line: 2, .. })
        ));
    }
}
