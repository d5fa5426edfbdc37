//! DSL parser
//!
//! Grammar:
//!
//! ```text
//! query   := clause ( "." clause )*
//! clause  := name "(" arg ( "," arg )* ")"
//! arg     := value | value (":" | "=") value | [bound] ":" [bound]
//! value   := word | 'quoted' | "quoted"
//! ```
//!
//! Nothing is silently dropped: unknown clause names, nested or unbalanced
//! parentheses, empty argument lists and conflicting singular clauses are
//! all parse errors.

use std::collections::BTreeSet;

use super::ast::{insert_unique, CohortSpec, Constraint, NodeId};
use super::dates::{DateBound, DateRange};
use super::errors::{DslError, DslResult};

/// Parses a DSL string into a constraint
pub fn parse(text: &str) -> DslResult<Constraint> {
    let tokens = Lexer::new(text).tokenize()?;
    Parser::new(tokens, text.len()).parse()
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Word(String),
    Quoted(String),
    LParen,
    RParen,
    Comma,
    Colon,
    Equals,
    Dot,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

struct Lexer<'a> {
    text: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self { text }
    }

    fn tokenize(&self) -> DslResult<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut chars = self.text.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            let kind = match c {
                c if c.is_whitespace() => continue,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ',' => TokenKind::Comma,
                ':' => TokenKind::Colon,
                '=' => TokenKind::Equals,
                '.' => TokenKind::Dot,
                '\'' | '"' => {
                    let mut value = String::new();
                    let mut closed = false;
                    for (_, next) in chars.by_ref() {
                        if next == c {
                            closed = true;
                            break;
                        }
                        value.push(next);
                    }
                    if !closed {
                        return Err(DslError::parse(offset, "unterminated quoted value"));
                    }
                    TokenKind::Quoted(value)
                }
                c if is_word_char(c) => {
                    let mut word = String::from(c);
                    while let Some(&(_, next)) = chars.peek() {
                        if !is_word_char(next) {
                            break;
                        }
                        word.push(next);
                        chars.next();
                    }
                    TokenKind::Word(word)
                }
                other => {
                    return Err(DslError::parse(
                        offset,
                        format!("unexpected character '{}'", other),
                    ))
                }
            };
            tokens.push(Token { kind, offset });
        }

        Ok(tokens)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end_offset: usize,
    constraint: Constraint,
}

impl Parser {
    fn new(tokens: Vec<Token>, end_offset: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end_offset,
            constraint: Constraint::default(),
        }
    }

    fn parse(mut self) -> DslResult<Constraint> {
        let mut first = true;

        while self.pos < self.tokens.len() {
            if !first {
                let token = self.next_token()?;
                if token.kind != TokenKind::Dot {
                    return Err(DslError::parse(
                        token.offset,
                        format!("expected '.' between clauses, found {}", describe(&token.kind)),
                    ));
                }
            }
            first = false;
            self.parse_clause()?;
        }

        Ok(self.constraint)
    }

    fn next_token(&mut self) -> DslResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| DslError::parse(self.end_offset, "unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    fn parse_clause(&mut self) -> DslResult<()> {
        let name_token = self.next_token()?;
        let name = match &name_token.kind {
            TokenKind::Word(w) => w.clone(),
            TokenKind::RParen => {
                return Err(DslError::parse(
                    name_token.offset,
                    "unbalanced parenthesis: unexpected ')'",
                ))
            }
            other => {
                return Err(DslError::parse(
                    name_token.offset,
                    format!("expected clause name, found {}", describe(other)),
                ))
            }
        };

        let open = self.next_token().map_err(|_| {
            DslError::parse(self.end_offset, format!("expected '(' after '{}'", name))
        })?;
        if open.kind != TokenKind::LParen {
            return Err(DslError::parse(
                open.offset,
                format!("expected '(' after '{}'", name),
            ));
        }

        let args = self.collect_args(open.offset)?;
        self.apply_clause(&name, name_token.offset, args)
    }

    /// Collects comma-separated argument token lists up to the closing paren
    fn collect_args(&mut self, open_offset: usize) -> DslResult<Vec<Vec<Token>>> {
        let mut args: Vec<Vec<Token>> = Vec::new();
        let mut current: Vec<Token> = Vec::new();

        loop {
            let token = self.tokens.get(self.pos).cloned().ok_or_else(|| {
                DslError::parse(open_offset, "unbalanced parenthesis: missing ')'")
            })?;
            self.pos += 1;

            match token.kind {
                TokenKind::RParen => {
                    if current.is_empty() {
                        return Err(DslError::parse(token.offset, "empty argument"));
                    }
                    args.push(current);
                    return Ok(args);
                }
                TokenKind::Comma => {
                    if current.is_empty() {
                        return Err(DslError::parse(token.offset, "empty argument"));
                    }
                    args.push(std::mem::take(&mut current));
                }
                TokenKind::LParen => {
                    return Err(DslError::parse(
                        token.offset,
                        "unbalanced parenthesis: nested '(' is not allowed",
                    ))
                }
                TokenKind::Dot => {
                    return Err(DslError::parse(
                        token.offset,
                        "unbalanced parenthesis: '.' inside arguments",
                    ))
                }
                _ => current.push(token),
            }
        }
    }

    fn apply_clause(&mut self, name: &str, offset: usize, args: Vec<Vec<Token>>) -> DslResult<()> {
        match name {
            "from" => {
                let node = single_arg(name, offset, &args)?;
                set_singular(&mut self.constraint.from, node, "from", offset)
            }
            "to" => {
                let node = single_arg(name, offset, &args)?;
                set_singular(&mut self.constraint.to, node, "to", offset)
            }
            "visited" => {
                for arg in &args {
                    self.constraint.visited.insert(value_of(arg)?);
                }
                Ok(())
            }
            "exclude" => {
                for arg in &args {
                    self.constraint.exclude.insert(value_of(arg)?);
                }
                Ok(())
            }
            "visitedAny" => {
                let group: BTreeSet<NodeId> =
                    args.iter().map(|a| value_of(a)).collect::<DslResult<_>>()?;
                self.constraint.visited_any.insert(group);
                Ok(())
            }
            "context" => {
                for arg in &args {
                    let (key, value) = key_value(arg)?;
                    insert_unique("context", &mut self.constraint.context, &key, &value)
                        .map_err(|e| with_offset(e, arg[0].offset))?;
                }
                Ok(())
            }
            "case" => {
                for arg in &args {
                    let (key, value) = key_value(arg)?;
                    insert_unique("case", &mut self.constraint.case, &key, &value)
                        .map_err(|e| with_offset(e, arg[0].offset))?;
                }
                Ok(())
            }
            "contextAny" => {
                let mut current_key: Option<String> = None;
                for arg in &args {
                    let (key, value) = if arg.len() == 1 {
                        let key = current_key.clone().ok_or_else(|| {
                            DslError::parse(arg[0].offset, "contextAny() value before any key")
                        })?;
                        (key, value_of(arg)?)
                    } else {
                        key_value(arg)?
                    };
                    self.constraint
                        .context_any
                        .entry(key.clone())
                        .or_default()
                        .insert(value);
                    current_key = Some(key);
                }
                Ok(())
            }
            "window" => {
                if args.len() != 1 {
                    return Err(DslError::parse(offset, "window() takes exactly one range"));
                }
                if self.constraint.cohort.is_some() {
                    return Err(DslError::parse(offset, "cohort() and window() cannot be combined"));
                }
                let range = range_of(&args[0])?;
                set_singular(&mut self.constraint.window, range, "window", offset)
            }
            "cohort" => {
                if self.constraint.window.is_some() {
                    return Err(DslError::parse(offset, "cohort() and window() cannot be combined"));
                }
                let spec = match args.len() {
                    1 => CohortSpec {
                        anchor: None,
                        range: range_of(&args[0])?,
                    },
                    2 => CohortSpec {
                        anchor: Some(value_of(&args[0])?),
                        range: range_of(&args[1])?,
                    },
                    _ => {
                        return Err(DslError::parse(
                            offset,
                            "cohort() takes (range) or (anchor, range)",
                        ))
                    }
                };
                set_singular(&mut self.constraint.cohort, spec, "cohort", offset)
            }
            other => Err(DslError::UnknownFunction {
                name: other.to_string(),
                offset,
            }),
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Word(w) => format!("'{}'", w),
        TokenKind::Quoted(q) => format!("quoted value '{}'", q),
        TokenKind::LParen => "'('".into(),
        TokenKind::RParen => "')'".into(),
        TokenKind::Comma => "','".into(),
        TokenKind::Colon => "':'".into(),
        TokenKind::Equals => "'='".into(),
        TokenKind::Dot => "'.'".into(),
    }
}

fn with_offset(err: DslError, offset: usize) -> DslError {
    match err {
        DslError::Parse { message, .. } => DslError::Parse { offset, message },
        other => other,
    }
}

fn set_singular<T: PartialEq>(
    slot: &mut Option<T>,
    value: T,
    clause: &str,
    offset: usize,
) -> DslResult<()> {
    match slot {
        Some(existing) if *existing != value => Err(DslError::parse(
            offset,
            format!("conflicting {}() clauses", clause),
        )),
        Some(_) => Ok(()),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}

fn single_arg(name: &str, offset: usize, args: &[Vec<Token>]) -> DslResult<NodeId> {
    if args.len() != 1 {
        return Err(DslError::parse(
            offset,
            format!("{}() takes exactly one node id", name),
        ));
    }
    value_of(&args[0])
}

fn value_of(arg: &[Token]) -> DslResult<String> {
    match arg {
        [Token {
            kind: TokenKind::Word(w),
            ..
        }] => Ok(w.clone()),
        [Token {
            kind: TokenKind::Quoted(q),
            offset,
        }] => {
            if q.is_empty() {
                Err(DslError::parse(*offset, "empty quoted value"))
            } else {
                Ok(q.clone())
            }
        }
        [first, ..] => Err(DslError::parse(
            first.offset,
            format!("expected a single value, found {}", describe(&first.kind)),
        )),
        [] => Err(DslError::parse(0, "empty argument")),
    }
}

fn key_value(arg: &[Token]) -> DslResult<(String, String)> {
    match arg {
        [key, sep, value]
            if matches!(sep.kind, TokenKind::Colon | TokenKind::Equals) =>
        {
            let key = value_of(std::slice::from_ref(key))?;
            let value = value_of(std::slice::from_ref(value))?;
            Ok((key, value))
        }
        [first, ..] => Err(DslError::parse(
            first.offset,
            "expected key:value or key='value'",
        )),
        [] => Err(DslError::parse(0, "empty argument")),
    }
}

fn range_of(arg: &[Token]) -> DslResult<DateRange> {
    let colon = arg
        .iter()
        .position(|t| t.kind == TokenKind::Colon)
        .ok_or_else(|| DslError::parse(arg[0].offset, "expected a from:to date range"))?;

    let bound = |tokens: &[Token]| -> DslResult<Option<DateBound>> {
        match tokens {
            [] => Ok(None),
            [Token {
                kind: TokenKind::Word(w),
                ..
            }] => DateBound::parse(w).map(Some),
            [first, ..] => Err(DslError::parse(first.offset, "malformed date bound")),
        }
    };

    let start = bound(&arg[..colon])?;
    let end = bound(&arg[colon + 1..])?;
    DateRange::new(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::canonical::canonicalize;

    #[test]
    fn test_parse_full_query() {
        let c = parse("from(a).to(d).visited(b).exclude(c,e)").unwrap();
        assert_eq!(c.from.as_deref(), Some("a"));
        assert_eq!(c.to.as_deref(), Some("d"));
        assert!(c.visited.contains("b"));
        assert_eq!(c.exclude.len(), 2);
    }

    #[test]
    fn test_repeated_clauses_accumulate() {
        let c = parse("visited(a).visited(b).exclude(x).exclude(x,y)").unwrap();
        assert_eq!(c.visited.len(), 2);
        assert_eq!(c.exclude.len(), 2);
    }

    #[test]
    fn test_context_forms() {
        let colon = parse("context(channel:google)").unwrap();
        let equals = parse("context(channel='google')").unwrap();
        assert_eq!(colon, equals);
        let multi = parse("context(channel:google,device:mobile)").unwrap();
        assert_eq!(multi.context.len(), 2);
    }

    #[test]
    fn test_context_conflict_rejected() {
        let err = parse("context(channel:google).context(channel:meta)").unwrap_err();
        assert_eq!(err.code(), "DQ_PARSE_ERROR");
    }

    #[test]
    fn test_context_any() {
        let c = parse("contextAny(channel:google,meta).contextAny(channel:tiktok)").unwrap();
        assert_eq!(c.context_any["channel"].len(), 3);
        assert!(parse("contextAny(google)").is_err());
    }

    #[test]
    fn test_cohort_and_window() {
        let c = parse("cohort(a,1-Jan-25:31-Jan-25)").unwrap();
        let spec = c.cohort.unwrap();
        assert_eq!(spec.anchor.as_deref(), Some("a"));

        let w = parse("window(-30d:)").unwrap();
        assert!(w.window.is_some());

        assert!(parse("cohort(-7d:).window(-7d:)").is_err());
        assert!(parse("window(:)").is_err());
    }

    #[test]
    fn test_unbalanced_parens() {
        assert!(matches!(
            parse("visited(a").unwrap_err(),
            DslError::Parse { .. }
        ));
        assert!(parse("visited(a))").is_err());
        assert!(parse("visited((a))").is_err());
    }

    #[test]
    fn test_unknown_function() {
        let err = parse("from(a).minus(b)").unwrap_err();
        assert_eq!(
            err,
            DslError::UnknownFunction {
                name: "minus".into(),
                offset: 8
            }
        );
    }

    #[test]
    fn test_empty_arguments_rejected() {
        assert!(parse("visited()").is_err());
        assert!(parse("visited(a,,b)").is_err());
        assert!(parse("visited('')").is_err());
    }

    #[test]
    fn test_missing_separator() {
        assert!(parse("from(a)to(b)").is_err());
        assert!(parse("from(a).").is_err());
    }

    #[test]
    fn test_singular_repeats() {
        assert!(parse("from(a).from(a)").is_ok());
        assert!(parse("from(a).from(b)").is_err());
    }

    #[test]
    fn test_whitespace_and_empty() {
        let c = parse("  from( a ) . to(b) ").unwrap();
        assert_eq!(canonicalize(&c), "from(a).to(b)");
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_quoted_values_roundtrip() {
        let c = parse("context(campaign:'spring sale')").unwrap();
        assert_eq!(c.context["campaign"], "spring sale");
        assert_eq!(parse(&canonicalize(&c)).unwrap(), c);
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(parse("context(campaign:'spring").is_err());
    }
}
