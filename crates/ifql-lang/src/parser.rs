//! Recursive descent parser for IFQL programs.
//!
//! The top level is a sequence of statements, each `var name = chain` or a
//! bare call chain. Argument values have their own small grammar (literals,
//! arrays, arrow functions, `{ predicate }` blocks). Predicate expressions
//! use C-like precedence:
//!
//! `or < and < == != < relational < + - < * / < primary`
//!
//! Every binary level is a `head (op tail)*` loop folded left at build
//! time. Regex literals are re-scanned from the source text when a `/`
//! appears in primary position, so division elsewhere stays unambiguous.

use std::fmt;
use std::ops::Range;

use ifql_ast::*;

use crate::token::{lex, line_col, unescape_string, Token};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line: u32,
    pub col: u32,
    pub offset: u32,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at {}:{}: {}",
            self.line, self.col, self.message
        )
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for ifql_core::Error {
    fn from(e: ParseError) -> Self {
        ifql_core::Error::Parse {
            line: e.line,
            col: e.col,
            message: e.message,
        }
    }
}

/// Parse a complete program. Total on its input: every byte sequence
/// yields either a `Program` or a `ParseError` positioned within it.
pub fn parse(src: &str) -> Result<Program, ParseError> {
    let tokens = lex(src)?;
    let mut stream = TokenStream {
        src,
        tokens,
        pos: 0,
    };
    let mut body = Vec::new();
    while !stream.at_end() {
        body.push(parse_statement(&mut stream)?);
    }
    Ok(Program { body })
}

struct TokenStream<'src> {
    src: &'src str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
}

impl<'src> TokenStream<'src> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn current_offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.src.len())
    }

    fn current_pos(&self) -> Pos {
        let offset = self.current_offset();
        let (line, col) = line_col(self.src, offset);
        Pos::new(line, col, offset as u32)
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        let offset = self.current_offset();
        let (line, col) = line_col(self.src, offset);
        ParseError {
            line,
            col,
            offset: offset as u32,
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected) => {
                self.advance();
                Ok(())
            }
            Some(t) => Err(self.err(format!("expected {what}, found {t:?}"))),
            None => Err(self.err(format!("expected {what}, found end of input"))),
        }
    }

    fn take_ident(&mut self, what: &str) -> Result<Identifier, ParseError> {
        let pos = self.current_pos();
        match self.advance() {
            Some(Token::Ident(name)) => Ok(Identifier { name, pos }),
            Some(t) => Err(self.err(format!("expected {what}, found {t:?}"))),
            None => Err(self.err(format!("expected {what}, found end of input"))),
        }
    }

    /// Re-scan a regex literal from the raw source. The current token must
    /// be `Slash`; tokens covered by the literal are skipped afterwards.
    fn take_regex(&mut self) -> Result<RegexLiteral, ParseError> {
        let start = self.current_offset();
        let mut pattern = String::new();
        let mut chars = self.src[start + 1..].char_indices().peekable();
        let end;
        loop {
            match chars.next() {
                Some((i, '/')) => {
                    end = start + 1 + i + 1;
                    break;
                }
                Some((_, '\\')) => match chars.next() {
                    Some((_, '/')) => pattern.push('/'),
                    Some((_, other)) => {
                        pattern.push('\\');
                        pattern.push(other);
                    }
                    None => return Err(self.err("unterminated regular expression")),
                },
                Some((_, '\n')) | None => {
                    return Err(self.err("unterminated regular expression"));
                }
                Some((_, ch)) => pattern.push(ch),
            }
        }
        while self
            .tokens
            .get(self.pos)
            .map(|(_, span)| span.start < end)
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        Ok(RegexLiteral { pattern })
    }
}

fn parse_statement(stream: &mut TokenStream) -> Result<Statement, ParseError> {
    if stream.peek() == Some(&Token::Var) {
        stream.advance();
        let name = stream.take_ident("variable name")?;
        stream.expect(&Token::Assign, "'='")?;
        let init = parse_pipeline(stream)?;
        return Ok(Statement::Variable(VariableDeclaration { name, init }));
    }
    let expression = parse_pipeline(stream)?;
    match expression {
        Expression::Call(_) => Ok(Statement::Expression(ExpressionStatement { expression })),
        _ => Err(stream.err("expected a call expression statement")),
    }
}

/// A call chain: `callee(args)`, `callee(args).member`,
/// `callee(args).next(args)`, rooted at an identifier.
fn parse_pipeline(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    let pos = stream.current_pos();
    let head = stream.take_ident("function or variable name")?;
    let mut expr = Expression::Identifier(head);
    loop {
        match stream.peek() {
            Some(Token::LParen) => {
                let arguments = parse_arguments(stream)?;
                expr = Expression::Call(Box::new(CallExpression {
                    callee: expr,
                    arguments,
                    pos,
                }));
            }
            Some(Token::Dot) => {
                stream.advance();
                let property = stream.take_ident("member name")?;
                expr = Expression::Member(Box::new(MemberExpression {
                    object: expr,
                    property: Expression::Identifier(property),
                }));
            }
            _ => break,
        }
    }
    Ok(expr)
}

fn parse_arguments(stream: &mut TokenStream) -> Result<Vec<Argument>, ParseError> {
    stream.expect(&Token::LParen, "'('")?;
    let mut arguments = Vec::new();
    if stream.peek() == Some(&Token::RParen) {
        stream.advance();
        return Ok(arguments);
    }
    loop {
        let name = stream.take_ident("argument name")?;
        stream.expect(&Token::Colon, "':'")?;
        let value = parse_arg_value(stream)?;
        arguments.push(Argument { name, value });
        match stream.peek() {
            Some(Token::Comma) => {
                stream.advance();
            }
            Some(Token::RParen) => {
                stream.advance();
                break;
            }
            _ => return Err(stream.err("expected ',' or ')' in argument list")),
        }
    }
    Ok(arguments)
}

fn parse_arg_value(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    match stream.peek() {
        Some(Token::Str(_)) => parse_string(stream),
        Some(Token::Integer(_)) | Some(Token::Float(_)) | Some(Token::Duration(_))
        | Some(Token::Minus) => parse_number(stream),
        Some(Token::DateTime(_)) => parse_datetime(stream),
        Some(Token::Slash) => Ok(Expression::Regex(stream.take_regex()?)),
        Some(Token::Dollar) => {
            stream.advance();
            Ok(Expression::Field(FieldLiteral {}))
        }
        Some(Token::LBracket) => parse_array(stream),
        Some(Token::LParen) => parse_arrow_multi(stream),
        Some(Token::LBrace) => parse_brace_value(stream),
        Some(Token::Ident(_)) => {
            if stream.peek_nth(1) == Some(&Token::Arrow) {
                let param = stream.take_ident("parameter name")?;
                stream.advance();
                let body = parse_predicate(stream)?;
                Ok(Expression::Arrow(Box::new(ArrowFunctionExpression {
                    params: vec![param],
                    body,
                })))
            } else {
                Ok(Expression::Identifier(stream.take_ident("identifier")?))
            }
        }
        Some(t) => {
            let t = t.clone();
            Err(stream.err(format!("unexpected {t:?} in argument value")))
        }
        None => Err(stream.err("expected argument value, found end of input")),
    }
}

fn parse_array(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    stream.expect(&Token::LBracket, "'['")?;
    let mut elements = Vec::new();
    if stream.peek() == Some(&Token::RBracket) {
        stream.advance();
        return Ok(Expression::Array(ArrayExpression { elements }));
    }
    loop {
        elements.push(parse_arg_value(stream)?);
        match stream.peek() {
            Some(Token::Comma) => {
                stream.advance();
            }
            Some(Token::RBracket) => {
                stream.advance();
                break;
            }
            _ => return Err(stream.err("expected ',' or ']' in array")),
        }
    }
    Ok(Expression::Array(ArrayExpression { elements }))
}

/// `(a,b) => body`: in argument position a parenthesis can only open an
/// arrow function's parameter list.
fn parse_arrow_multi(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    stream.expect(&Token::LParen, "'('")?;
    let mut params = Vec::new();
    loop {
        params.push(stream.take_ident("parameter name")?);
        match stream.peek() {
            Some(Token::Comma) => {
                stream.advance();
            }
            Some(Token::RParen) => {
                stream.advance();
                break;
            }
            _ => return Err(stream.err("expected ',' or ')' in parameter list")),
        }
    }
    stream.expect(&Token::Arrow, "'=>'")?;
    let body = parse_predicate(stream)?;
    Ok(Expression::Arrow(Box::new(ArrowFunctionExpression {
        params,
        body,
    })))
}

/// `{ ident: value, ... }` is an object; any other brace block is a
/// predicate expression.
fn parse_brace_value(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    let is_object = matches!(stream.peek_nth(1), Some(Token::Ident(_)))
        && stream.peek_nth(2) == Some(&Token::Colon);
    stream.expect(&Token::LBrace, "'{'")?;
    if is_object {
        let mut properties = Vec::new();
        loop {
            let key = stream.take_ident("property name")?;
            stream.expect(&Token::Colon, "':'")?;
            let value = parse_arg_value(stream)?;
            properties.push(Property { key, value });
            match stream.peek() {
                Some(Token::Comma) => {
                    stream.advance();
                }
                Some(Token::RBrace) => {
                    stream.advance();
                    break;
                }
                _ => return Err(stream.err("expected ',' or '}' in object")),
            }
        }
        return Ok(Expression::Object(ObjectExpression { properties }));
    }
    let expr = parse_predicate(stream)?;
    stream.expect(&Token::RBrace, "'}'")?;
    Ok(expr)
}

fn parse_string(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    match stream.advance() {
        Some(Token::Str(raw)) => match unescape_string(&raw) {
            Ok(value) => Ok(Expression::String(StringLiteral { value })),
            Err(msg) => Err(stream.err(msg)),
        },
        _ => Err(stream.err("expected string literal")),
    }
}

fn parse_datetime(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    match stream.advance() {
        Some(Token::DateTime(value)) => {
            if chrono::DateTime::parse_from_rfc3339(&value).is_err() {
                return Err(stream.err(format!("invalid date-time literal {value:?}")));
            }
            Ok(Expression::DateTime(DateTimeLiteral { value }))
        }
        _ => Err(stream.err("expected date-time literal")),
    }
}

/// Integer, float, or duration, with an optional leading sign. Leading
/// zeros are forbidden unless the literal is `0`.
fn parse_number(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    let negative = if stream.peek() == Some(&Token::Minus) {
        stream.advance();
        true
    } else {
        false
    };
    let sign = if negative { -1 } else { 1 };
    match stream.advance() {
        Some(Token::Integer(s)) => {
            check_leading_zero(stream, &s)?;
            let v: i64 = s
                .parse()
                .map_err(|_| stream.err(format!("integer literal {s:?} out of range")))?;
            Ok(Expression::Integer(IntegerLiteral { value: sign * v }))
        }
        Some(Token::Float(s)) => {
            let int_part = s.split('.').next().unwrap_or(&s);
            check_leading_zero(stream, int_part)?;
            let v: f64 = s
                .parse()
                .map_err(|_| stream.err(format!("invalid float literal {s:?}")))?;
            Ok(Expression::Float(FloatLiteral {
                value: sign as f64 * v,
            }))
        }
        Some(Token::Duration(s)) => Ok(Expression::Duration(DurationLiteral {
            values: duration_components(&s, sign),
        })),
        Some(t) => Err(stream.err(format!("expected number, found {t:?}"))),
        None => Err(stream.err("expected number, found end of input")),
    }
}

fn check_leading_zero(stream: &TokenStream, digits: &str) -> Result<(), ParseError> {
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(stream.err(format!("invalid number literal {digits:?}: leading zero")));
    }
    Ok(())
}

/// Split `1h30m15s` into components. The lexer guarantees alternating
/// digit and unit runs, so parses here cannot fail.
fn duration_components(s: &str, sign: i64) -> Vec<DurationComponent> {
    let mut values = Vec::new();
    let mut magnitude = String::new();
    let mut unit = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            if !unit.is_empty() {
                values.push(DurationComponent {
                    magnitude: sign * magnitude.parse::<i64>().unwrap_or(0),
                    unit: std::mem::take(&mut unit),
                });
                magnitude.clear();
            }
            magnitude.push(ch);
        } else {
            unit.push(ch);
        }
    }
    if !magnitude.is_empty() {
        values.push(DurationComponent {
            magnitude: sign * magnitude.parse::<i64>().unwrap_or(0),
            unit,
        });
    }
    values
}

// ---- predicate expressions ----

pub(crate) fn parse_predicate(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    parse_logical_or(stream)
}

fn parse_logical_or(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    let mut left = parse_logical_and(stream)?;
    while stream.peek() == Some(&Token::Or) {
        stream.advance();
        let right = parse_logical_and(stream)?;
        left = Expression::Logical(Box::new(LogicalExpression {
            operator: LogicalOperator::Or,
            left,
            right,
        }));
    }
    Ok(left)
}

fn parse_logical_and(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    let mut left = parse_equality(stream)?;
    while stream.peek() == Some(&Token::And) {
        stream.advance();
        let right = parse_equality(stream)?;
        left = Expression::Logical(Box::new(LogicalExpression {
            operator: LogicalOperator::And,
            left,
            right,
        }));
    }
    Ok(left)
}

fn parse_equality(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    let mut left = parse_relational(stream)?;
    loop {
        let operator = match stream.peek() {
            Some(Token::Eq) => BinaryOperator::Eq,
            Some(Token::Neq) => BinaryOperator::Neq,
            _ => break,
        };
        stream.advance();
        let right = parse_relational(stream)?;
        left = Expression::Binary(Box::new(BinaryExpression {
            operator,
            left,
            right,
        }));
    }
    Ok(left)
}

fn parse_relational(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    let mut left = parse_additive(stream)?;
    loop {
        let operator = match stream.peek() {
            Some(Token::Lte) => BinaryOperator::Lte,
            Some(Token::Lt) => BinaryOperator::Lt,
            Some(Token::Gte) => BinaryOperator::Gte,
            Some(Token::Gt) => BinaryOperator::Gt,
            Some(Token::StartsWith) => BinaryOperator::StartsWith,
            Some(Token::In) => BinaryOperator::In,
            Some(Token::Empty) => BinaryOperator::Empty,
            Some(Token::Not) if stream.peek_nth(1) == Some(&Token::Empty) => {
                stream.advance();
                BinaryOperator::NotEmpty
            }
            _ => break,
        };
        stream.advance();
        let right = parse_additive(stream)?;
        left = Expression::Binary(Box::new(BinaryExpression {
            operator,
            left,
            right,
        }));
    }
    Ok(left)
}

fn parse_additive(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    let mut left = parse_multiplicative(stream)?;
    loop {
        let operator = match stream.peek() {
            Some(Token::Plus) => BinaryOperator::Add,
            Some(Token::Minus) => BinaryOperator::Sub,
            _ => break,
        };
        stream.advance();
        let right = parse_multiplicative(stream)?;
        left = Expression::Binary(Box::new(BinaryExpression {
            operator,
            left,
            right,
        }));
    }
    Ok(left)
}

fn parse_multiplicative(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    let mut left = parse_primary(stream)?;
    loop {
        let operator = match stream.peek() {
            Some(Token::Star) => BinaryOperator::Mul,
            Some(Token::Slash) => BinaryOperator::Div,
            _ => break,
        };
        stream.advance();
        let right = parse_primary(stream)?;
        left = Expression::Binary(Box::new(BinaryExpression {
            operator,
            left,
            right,
        }));
    }
    Ok(left)
}

fn parse_primary(stream: &mut TokenStream) -> Result<Expression, ParseError> {
    match stream.peek() {
        Some(Token::LParen) => {
            stream.advance();
            let expr = parse_logical_or(stream)?;
            stream.expect(&Token::RParen, "')'")?;
            Ok(expr)
        }
        Some(Token::Minus) | Some(Token::Integer(_)) | Some(Token::Float(_))
        | Some(Token::Duration(_)) => parse_number(stream),
        Some(Token::Str(_)) => parse_string(stream),
        Some(Token::DateTime(_)) => parse_datetime(stream),
        Some(Token::Dollar) => {
            stream.advance();
            Ok(Expression::Field(FieldLiteral {}))
        }
        Some(Token::Slash) => Ok(Expression::Regex(stream.take_regex()?)),
        Some(Token::LBracket) => parse_array(stream),
        Some(Token::Ident(_)) => {
            let id = stream.take_ident("identifier")?;
            let mut expr = Expression::Identifier(id);
            loop {
                match stream.peek() {
                    Some(Token::Dot) => {
                        stream.advance();
                        let property = stream.take_ident("member name")?;
                        expr = Expression::Member(Box::new(MemberExpression {
                            object: expr,
                            property: Expression::Identifier(property),
                        }));
                    }
                    Some(Token::LBracket) => {
                        stream.advance();
                        let property = parse_string(stream)?;
                        stream.expect(&Token::RBracket, "']'")?;
                        expr = Expression::Member(Box::new(MemberExpression {
                            object: expr,
                            property,
                        }));
                    }
                    _ => break,
                }
            }
            Ok(expr)
        }
        Some(t) => {
            let t = t.clone();
            Err(stream.err(format!("unexpected {t:?} in expression")))
        }
        None => Err(stream.err("expected expression, found end of input")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_chain() {
        let program = parse(r#"var a = from(db:"dbA").range(start:-1h)"#).unwrap();
        assert_eq!(program.body.len(), 1);
        let Statement::Variable(decl) = &program.body[0] else {
            panic!("expected variable statement");
        };
        assert_eq!(decl.name.name, "a");
        let Expression::Call(call) = &decl.init else {
            panic!("expected call");
        };
        let Expression::Member(member) = &call.callee else {
            panic!("expected member callee");
        };
        assert_eq!(member.property_name(), Some("range"));
        assert_eq!(call.arguments[0].name.name, "start");
        assert_eq!(
            call.arguments[0].value,
            Expression::Duration(DurationLiteral {
                values: vec![DurationComponent {
                    magnitude: -1,
                    unit: "h".into()
                }]
            })
        );
    }

    #[test]
    fn parses_join_with_arrow_function() {
        let program = parse(
            r#"join(tables:[a,b], on:["host"], f: (a,b) => a["_value"] + b["_value"])"#,
        )
        .unwrap();
        let Statement::Expression(stmt) = &program.body[0] else {
            panic!("expected expression statement");
        };
        let Expression::Call(call) = &stmt.expression else {
            panic!("expected call");
        };
        assert_eq!(call.arguments.len(), 3);
        let Expression::Arrow(arrow) = &call.arguments[2].value else {
            panic!("expected arrow function");
        };
        assert_eq!(arrow.params.len(), 2);
        let Expression::Binary(bin) = &arrow.body else {
            panic!("expected binary body");
        };
        assert_eq!(bin.operator, BinaryOperator::Add);
    }

    #[test]
    fn duration_scenario() {
        let program = parse("range(start:1h30m15s)").unwrap();
        let Statement::Expression(stmt) = &program.body[0] else {
            panic!("expected expression statement");
        };
        let Expression::Call(call) = &stmt.expression else {
            panic!("expected call");
        };
        let Expression::Duration(d) = &call.arguments[0].value else {
            panic!("expected duration");
        };
        assert_eq!(d.nanoseconds(), 5_415_000_000_000);
    }

    #[test]
    fn where_block_precedence() {
        let program =
            parse(r#"from(db:"d").where(exp:{("t1"=="a") and ("t2"=="b") or $ > 5})"#).unwrap();
        let Statement::Expression(stmt) = &program.body[0] else {
            panic!("expected expression statement");
        };
        let Expression::Call(call) = &stmt.expression else {
            panic!("expected call");
        };
        let Expression::Logical(or) = &call.arguments[0].value else {
            panic!("expected or at top, got {:?}", call.arguments[0].value);
        };
        assert_eq!(or.operator, LogicalOperator::Or);
        let Expression::Logical(and) = &or.left else {
            panic!("expected and on the left");
        };
        assert_eq!(and.operator, LogicalOperator::And);
    }

    #[test]
    fn arithmetic_precedence_folds_left() {
        let program = parse("f(exp:{1 + 2 * 3 - 4})").unwrap();
        let Statement::Expression(stmt) = &program.body[0] else {
            panic!("expected expression statement");
        };
        let Expression::Call(call) = &stmt.expression else {
            panic!("expected call");
        };
        // ((1 + (2*3)) - 4)
        let Expression::Binary(sub) = &call.arguments[0].value else {
            panic!("expected binary");
        };
        assert_eq!(sub.operator, BinaryOperator::Sub);
        let Expression::Binary(add) = &sub.left else {
            panic!("expected add on the left");
        };
        assert_eq!(add.operator, BinaryOperator::Add);
        let Expression::Binary(mul) = &add.right else {
            panic!("expected mul on the right of add");
        };
        assert_eq!(mul.operator, BinaryOperator::Mul);
    }

    #[test]
    fn regex_literal_does_not_eat_division() {
        let program = parse(r#"f(exp:{$ == /ho\/st.*/ and $ / 2 > 1})"#).unwrap();
        let Statement::Expression(stmt) = &program.body[0] else {
            panic!("expected expression statement");
        };
        let Expression::Call(call) = &stmt.expression else {
            panic!("expected call");
        };
        let Expression::Logical(and) = &call.arguments[0].value else {
            panic!("expected and");
        };
        let Expression::Binary(eq) = &and.left else {
            panic!("expected ==");
        };
        let Expression::Regex(re) = &eq.right else {
            panic!("expected regex");
        };
        assert_eq!(re.pattern, "ho/st.*");
        let Expression::Binary(gt) = &and.right else {
            panic!("expected >");
        };
        let Expression::Binary(div) = &gt.left else {
            panic!("expected division");
        };
        assert_eq!(div.operator, BinaryOperator::Div);
    }

    #[test]
    fn error_reports_line_and_column() {
        let err = parse("var a =\n  from(,)").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.col > 1);
    }

    #[test]
    fn leading_zero_rejected() {
        assert!(parse("f(n:01)").is_err());
        assert!(parse("f(n:0)").is_ok());
    }

    #[test]
    fn stringify_round_trips() {
        let sources = [
            r#"var a = from(db:"dbA").range(start:-1h)"#,
            r#"join(tables:[a, b], on:["host"], f:(a,b) => a["_value"] + b["_value"])"#,
            r#"from(db:"d").where(exp:{("t1" == "a") and ("t2" startswith "b")})"#,
            r#"from(db:"d").range(start:2017-01-01T00:00:00Z, stop:1h30m).limit(n:10)"#,
        ];
        for src in sources {
            let first = parse(src).unwrap();
            let printed = first.to_string();
            let second = parse(&printed).unwrap();
            assert_eq!(first, second, "round trip changed AST for {src:?}");
        }
    }
}
