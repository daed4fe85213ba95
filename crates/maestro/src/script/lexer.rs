use std::ops::Range;

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    #[token("let")]
    Let,
    #[token("repeat")]
    Repeat,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", parse_number)]
    Number(f64),

    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    #[regex(r"'([^'\\\n]|\\.)*'", parse_string)]
    Str(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Equals,
}

fn parse_number(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            other => out.push(other),
        }
    }
    Some(out)
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Let => write!(f, "let"),
            Token::Repeat => write!(f, "repeat"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Number(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Ident(name) => write!(f, "{}", name),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Colon => write!(f, ":"),
            Token::Semicolon => write!(f, ";"),
            Token::Equals => write!(f, "="),
        }
    }
}

/// A token, or the text that could not be lexed, with its line number
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Result<Token, String>,
    pub line: usize,
}

/// Lexer wrapper with one token of lookahead and line tracking
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    peeked: Option<Option<Spanned>>,
    line: usize,
    line_offset: usize,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Lexer {
            inner: Token::lexer(source),
            peeked: None,
            line: 1,
            line_offset: 0,
        }
    }

    fn line_at(&mut self, span: &Range<usize>) -> usize {
        let source = self.inner.source();
        if span.start >= self.line_offset {
            self.line += source[self.line_offset..span.start].matches('\n').count();
            self.line_offset = span.start;
        }
        self.line
    }

    pub fn next_token(&mut self) -> Option<Spanned> {
        if let Some(peeked) = self.peeked.take() {
            return peeked;
        }
        let token = self.inner.next()?;
        let span = self.inner.span();
        let line = self.line_at(&span);
        let token = token.map_err(|_| self.inner.slice().to_string());
        Some(Spanned { token, line })
    }

    pub fn peek_token(&mut self) -> Option<&Spanned> {
        if self.peeked.is_none() {
            self.peeked = Some(self.next_token());
        }
        self.peeked.as_ref().and_then(|x| x.as_ref())
    }

    /// Line of the next token, or of the end of input
    pub fn line(&mut self) -> usize {
        if let Some(line) = self.peek_token().map(|spanned| spanned.line) {
            return line;
        }
        let end = self.inner.source().len();
        self.line_at(&(end..end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        while let Some(spanned) = lexer.next_token() {
            tokens.push(spanned.token.unwrap());
        }
        tokens
    }

    #[test]
    fn test_lex_call() {
        assert_eq!(
            lex(r#"runner.run("alda", 'piano: c');"#),
            vec![
                Token::Ident("runner".into()),
                Token::Dot,
                Token::Ident("run".into()),
                Token::LParen,
                Token::Str("alda".into()),
                Token::Comma,
                Token::Str("piano: c".into()),
                Token::RParen,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_lex_keywords_and_numbers() {
        assert_eq!(
            lex("let letter = -2.5e1 // trailing comment\nrepeat true null"),
            vec![
                Token::Let,
                Token::Ident("letter".into()),
                Token::Equals,
                Token::Number(-25.0),
                Token::Repeat,
                Token::True,
                Token::Null,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            lex(r#""play 60\nsleep 1" "say \"hi\"""#),
            vec![
                Token::Str("play 60\nsleep 1".into()),
                Token::Str("say \"hi\"".into())
            ]
        );
    }

    #[test]
    fn test_lines_and_errors() {
        let mut lexer = Lexer::new("a\n\n  b # c");
        assert_eq!(lexer.next_token().unwrap().line, 1);
        let b = lexer.next_token().unwrap();
        assert_eq!(b.line, 3);
        let bad = lexer.next_token().unwrap();
        assert_eq!(bad.token, Err("#".to_string()));
        assert_eq!(bad.line, 3);
    }
}
