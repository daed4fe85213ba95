use std::collections::HashSet;

use serde_json::{json, Value};

use super::lexer::{Lexer, Spanned, Token};
use super::{ScriptError, MAX_NESTING};

type Result<T> = std::result::Result<T, ScriptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Call {
        receiver: String,
        method: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        value: Expr,
        line: usize,
    },
    Repeat {
        count: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    Expr {
        expr: Expr,
        line: usize,
    },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Let { line, .. } | Stmt::Repeat { line, .. } | Stmt::Expr { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// Compile `source`, allowing calls only on the given capability names
pub fn parse(source: &str, capabilities: &[&str]) -> Result<Program> {
    let mut parser = Parser {
        lexer: Lexer::new(source),
        capabilities,
        scopes: vec![HashSet::new()],
        depth: 0,
    };
    let mut statements = Vec::new();
    while parser.lexer.peek_token().is_some() {
        statements.push(parser.statement()?);
    }
    Ok(Program { statements })
}

struct Parser<'s, 'c> {
    lexer: Lexer<'s>,
    capabilities: &'c [&'c str],
    scopes: Vec<HashSet<String>>,
    depth: usize,
}

impl Parser<'_, '_> {
    fn is_capability(&self, name: &str) -> bool {
        self.capabilities.contains(&name)
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn bind(&mut self, name: String) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name);
        }
    }

    /// Next token, failing at end of input or on unlexable text
    fn advance(&mut self, expected: &str) -> Result<(Token, usize)> {
        let line = self.lexer.line();
        match self.lexer.next_token() {
            Some(Spanned {
                token: Ok(token),
                line,
            }) => Ok((token, line)),
            Some(Spanned {
                token: Err(text),
                line,
            }) => Err(ScriptError::compile(
                line,
                format!("unexpected character `{}`", text),
            )),
            None => Err(ScriptError::compile(
                line,
                format!("expected {} but the script ended", expected),
            )),
        }
    }

    fn peek_is(&mut self, token: &Token) -> bool {
        matches!(self.lexer.peek_token(), Some(Spanned { token: Ok(next), .. }) if next == token)
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        let (found, line) = self.advance(&format!("`{}`", token))?;
        if found == token {
            Ok(())
        } else {
            Err(ScriptError::compile(
                line,
                format!("expected `{}`, found `{}`", token, found),
            ))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String> {
        match self.advance(what)? {
            (Token::Ident(name), _) => Ok(name),
            (other, line) => Err(ScriptError::compile(
                line,
                format!("expected {}, found `{}`", what, other),
            )),
        }
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(&mut self, line: usize, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(ScriptError::compile(
                line,
                format!("nesting too deep, at most {} levels", MAX_NESTING),
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn skip_semicolon(&mut self) {
        if self.peek_is(&Token::Semicolon) {
            self.lexer.next_token();
        }
    }

    fn statement(&mut self) -> Result<Stmt> {
        let line = self.lexer.line();
        let statement = if self.peek_is(&Token::Let) {
            self.lexer.next_token();
            let name = self.ident("a variable name")?;
            if self.is_capability(&name) {
                return Err(ScriptError::compile(
                    line,
                    format!("`{}` is a capability and cannot be rebound", name),
                ));
            }
            self.expect(Token::Equals)?;
            let value = self.expr()?;
            self.bind(name.clone());
            Stmt::Let { name, value, line }
        } else if self.peek_is(&Token::Repeat) {
            self.lexer.next_token();
            let count = self.expr()?;
            let body = self.block()?;
            return Ok(Stmt::Repeat { count, body, line });
        } else {
            let expr = self.expr()?;
            Stmt::Expr { expr, line }
        };
        self.skip_semicolon();
        Ok(statement)
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let line = self.lexer.line();
        self.nested(line, Self::block_body)
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>> {
        self.expect(Token::LBrace)?;
        self.scopes.push(HashSet::new());
        let mut body = Vec::new();
        loop {
            if self.peek_is(&Token::RBrace) {
                self.lexer.next_token();
                break;
            }
            if self.lexer.peek_token().is_none() {
                let line = self.lexer.line();
                return Err(ScriptError::compile(line, "unclosed `{`"));
            }
            body.push(self.statement()?);
        }
        self.scopes.pop();
        Ok(body)
    }

    fn expr(&mut self) -> Result<Expr> {
        let line = self.lexer.line();
        self.nested(line, Self::expr_body)
    }

    fn expr_body(&mut self) -> Result<Expr> {
        let (token, line) = self.advance("an expression")?;
        match token {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Number(n) => Ok(Expr::Literal(json!(n))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::LBracket => self.array(),
            Token::LBrace => self.object(),
            Token::Ident(name) => {
                if self.peek_is(&Token::Dot) {
                    self.lexer.next_token();
                    self.call(name, line)
                } else if self.is_bound(&name) {
                    Ok(Expr::Var(name))
                } else if self.is_capability(&name) {
                    Err(ScriptError::compile(
                        line,
                        format!("`{0}` can only be called, as in {0}.method()", name),
                    ))
                } else {
                    Err(ScriptError::compile(line, format!("unknown name `{}`", name)))
                }
            }
            other => Err(ScriptError::compile(line, format!("unexpected `{}`", other))),
        }
    }

    fn call(&mut self, receiver: String, line: usize) -> Result<Expr> {
        if !self.is_capability(&receiver) {
            let message = if self.is_bound(&receiver) {
                format!("`{}` is a variable, only capabilities have methods", receiver)
            } else {
                format!(
                    "unknown capability `{}`, available: {}",
                    receiver,
                    self.capabilities.join(", ")
                )
            };
            return Err(ScriptError::compile(line, message));
        }

        let method = self.ident("a method name")?;
        self.expect(Token::LParen)?;
        let args = self.list(Token::RParen)?;
        Ok(Expr::Call {
            receiver,
            method,
            args,
        })
    }

    /// Comma separated expressions up to `close`, trailing comma allowed
    fn list(&mut self, close: Token) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.peek_is(&close) {
                self.lexer.next_token();
                return Ok(items);
            }
            items.push(self.expr()?);
            if self.peek_is(&Token::Comma) {
                self.lexer.next_token();
            } else {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn array(&mut self) -> Result<Expr> {
        Ok(Expr::Array(self.list(Token::RBracket)?))
    }

    fn object(&mut self) -> Result<Expr> {
        let mut fields = Vec::new();
        loop {
            let (token, line) = self.advance("`}`")?;
            let key = match token {
                Token::RBrace => return Ok(Expr::Object(fields)),
                Token::Ident(key) | Token::Str(key) => key,
                other => {
                    return Err(ScriptError::compile(
                        line,
                        format!("expected an object key, found `{}`", other),
                    ))
                }
            };
            self.expect(Token::Colon)?;
            fields.push((key, self.expr()?));
            if self.peek_is(&Token::Comma) {
                self.lexer.next_token();
            } else {
                self.expect(Token::RBrace)?;
                return Ok(Expr::Object(fields));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPS: &[&str] = &["runner", "app", "console"];

    fn compile_error(source: &str) -> (usize, String) {
        match parse(source, CAPS) {
            Err(ScriptError::Compile { line, message }) => (line, message),
            other => panic!("expected a compile error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_program() {
        let program = parse(
            r#"
            let song = "piano: c e g";
            repeat 2 {
                runner.run("alda", song)
            }
            app.setPad(0, {label: "Kick", "volume": 0.9, tags: [1, 2,]});
            "#,
            CAPS,
        )
        .unwrap();

        assert_eq!(program.statements.len(), 3);
        assert!(matches!(&program.statements[0], Stmt::Let { name, line: 2, .. } if name == "song"));
        match &program.statements[1] {
            Stmt::Repeat { count, body, line } => {
                assert_eq!(*line, 3);
                assert_eq!(count, &Expr::Literal(json!(2.0)));
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &program.statements[2] {
            Stmt::Expr {
                expr: Expr::Call { receiver, method, args },
                line,
            } => {
                assert_eq!(receiver, "app");
                assert_eq!(method, "setPad");
                assert_eq!(*line, 6);
                assert!(matches!(&args[1], Expr::Object(fields) if fields.len() == 3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_free_names_are_rejected() {
        let (line, message) = compile_error("console.log(1)\nfetch.get(\"http://x\")");
        assert_eq!(line, 2);
        assert!(message.contains("unknown capability `fetch`"));

        let (_, message) = compile_error("console.log(window)");
        assert!(message.contains("unknown name `window`"));

        let (_, message) = compile_error("let x = runner");
        assert!(message.contains("can only be called"));

        let (_, message) = compile_error("let app = 1");
        assert!(message.contains("cannot be rebound"));

        let (_, message) = compile_error("let x = 1; x.run()");
        assert!(message.contains("is a variable"));
    }

    #[test]
    fn test_let_is_block_scoped() {
        let (line, message) = compile_error("repeat 1 {\n let inner = 1\n}\nconsole.log(inner)");
        assert_eq!(line, 4);
        assert!(message.contains("`inner`"));
        assert!(parse("let x = 1\nrepeat 1 { console.log(x) }", CAPS).is_ok());
    }

    #[test]
    fn test_syntax_errors() {
        let (_, message) = compile_error("console.log(1");
        assert!(message.contains("script ended"));

        let (line, message) = compile_error("\n\nrepeat 2 {\nconsole.log(1)\n");
        assert_eq!(line, 5);
        assert!(message.contains("unclosed"));

        let (_, message) = compile_error("console.log(1) # nope");
        assert!(message.contains("unexpected character `#`"));

        let (_, message) = compile_error("app.navigate(\"home\" \"studio\")");
        assert!(message.contains("expected `)`"));
    }

    #[test]
    fn test_deep_nesting_is_a_compile_error() {
        let deep = format!("console.log({}1{})", "[".repeat(200_000), "]".repeat(200_000));
        let (line, message) = compile_error(&deep);
        assert_eq!(line, 1);
        assert!(message.contains("nesting too deep"));

        let calls = format!("{}1{}", "console.log(".repeat(100), ")".repeat(100));
        assert!(compile_error(&calls).1.contains("nesting too deep"));

        let blocks = format!("{}{}", "repeat 1 {\n".repeat(100), "}".repeat(100));
        assert!(compile_error(&blocks).1.contains("nesting too deep"));

        let fine = format!("console.log({}1{})", "[".repeat(32), "]".repeat(32));
        assert!(parse(&fine, CAPS).is_ok());
    }

    #[test]
    fn test_empty_program() {
        assert!(parse("// nothing to see\n", CAPS).unwrap().statements.is_empty());
    }
}
