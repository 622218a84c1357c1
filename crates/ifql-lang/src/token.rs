//! Tokenization of IFQL source using logos.
//!
//! Tokens carry byte spans; line and column are derived on demand for
//! diagnostics. Multi-unit durations (`1h30m`) lex as a single token.
//! Regular expression literals are not lexed here: `/` is always `Slash`,
//! and the parser re-scans the source when a regex is grammatically
//! possible, so division never collides with regex syntax.

use logos::Logos;
use std::ops::Range;

use crate::parser::ParseError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    #[token("var")]
    Var,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("startswith")]
    StartsWith,
    #[token("in")]
    In,
    #[token("empty")]
    Empty,
    #[token("not")]
    Not,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("$")]
    Dollar,

    #[token("=>")]
    Arrow,
    #[token("=")]
    Assign,
    #[token("==")]
    Eq,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Lte,
    #[token("<")]
    Lt,
    #[token(">=")]
    Gte,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[regex(
        r"[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?(Z|[+-][0-9]{2}:[0-9]{2})",
        |lex| lex.slice().to_owned()
    )]
    DateTime(String),

    #[regex(
        r"[0-9]+(ns|us|\u{00b5}s|\u{03bc}s|ms|s|m|h)([0-9]+(ns|us|\u{00b5}s|\u{03bc}s|ms|s|m|h))*",
        |lex| lex.slice().to_owned()
    )]
    Duration(String),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().to_owned())]
    Float(String),

    #[regex(r"[0-9]+", |lex| lex.slice().to_owned())]
    Integer(String),

    #[regex(r#""(\\.|[^"\\])*""#, |lex| lex.slice().to_owned())]
    Str(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    /// Characters with no role of their own. They only appear inside
    /// regex literals, which the parser re-scans from the raw source;
    /// anywhere else the parser rejects them.
    #[regex(r#"[\\^?|~`'!@#&%;]"#, |lex| lex.slice().to_owned())]
    Unknown(String),
}

/// 1-based line and column of a byte offset.
pub fn line_col(src: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 1u32;
    for (i, ch) in src.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Tokenize the whole input. Lexing is total: anything the token set does
/// not cover becomes a `ParseError` with a position.
pub fn lex(src: &str) -> Result<Vec<(Token, Range<usize>)>, ParseError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(src);
    while let Some(item) = lexer.next() {
        let span = lexer.span();
        match item {
            Ok(tok) => tokens.push((tok, span)),
            Err(()) => {
                let (line, col) = line_col(src, span.start);
                let message = if src[span.start..].starts_with('"') {
                    "unterminated string literal".to_string()
                } else {
                    format!("unexpected character {:?}", &src[span.start..span.end])
                };
                return Err(ParseError {
                    line,
                    col,
                    offset: span.start as u32,
                    message,
                });
            }
        }
    }
    Ok(tokens)
}

/// Decode a quoted string token, validating escapes.
pub fn unescape_string(raw: &str) -> Result<String, String> {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => return Err(format!("invalid escape character {other:?}")),
            None => return Err("invalid trailing backslash".to_string()),
        }
    }
    Ok(out)
}
