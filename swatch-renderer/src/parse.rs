//! Directive parser: template source → [`Node`] tree.
//!
//! Supported actions:
//!
//! | action                               | meaning                          |
//! |--------------------------------------|----------------------------------|
//! | `{{ .key }}`                         | interpolate a setting            |
//! | `{{ .os }}`                          | interpolate the running OS       |
//! | `{{ .key \| default "x" }}`          | interpolate with a fallback      |
//! | `{{ if P }}` / `{{ else if P }}`     | open / continue a branch         |
//! | `{{ else }}` / `{{ end }}`           | fallback arm / close a branch    |
//! | `{{/* … */}}`                        | comment                          |
//!
//! `{{-` trims whitespace before the action, `-}}` trims whitespace after it.
//! Predicates: `eq A B`, `ne A B`, `not (P)`, `and (P) (P)…`, `or (P) (P)…`,
//! where one of `A`/`B` is `.key` or `.os` and the other a literal.

use swatch_core::OsName;

use crate::error::RenderError;
use crate::predicate::Predicate;

/// Name reserved for the running OS in `.os` references.
pub const OS_KEY: &str = "os";

/// What an interpolation reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Os,
    Setting(String),
}

/// One node of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Value {
        reference: Reference,
        default: Option<String>,
    },
    /// `if` / `else if` arms in order, then the `else` body (empty if absent).
    Branch {
        arms: Vec<(Predicate, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
}

// ---------------------------------------------------------------------------
// Lexing: split source into text and action segments, applying trim markers
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Segment {
    Text(String),
    Action { body: String, offset: usize },
}

struct Lexer<'a> {
    name: &'a str,
    src: &'a str,
    segments: Vec<Segment>,
    trim_next: bool,
}

impl<'a> Lexer<'a> {
    fn new(name: &'a str, src: &'a str) -> Self {
        Self { name, src, segments: Vec::new(), trim_next: false }
    }

    fn push_text(&mut self, text: &str) {
        let text = if std::mem::take(&mut self.trim_next) { text.trim_start() } else { text };
        if !text.is_empty() {
            self.segments.push(Segment::Text(text.to_owned()));
        }
    }

    fn trim_previous_text(&mut self) {
        if let Some(Segment::Text(prev)) = self.segments.last_mut() {
            let trimmed_len = prev.trim_end().len();
            prev.truncate(trimmed_len);
            if prev.is_empty() {
                self.segments.pop();
            }
        }
    }

    fn run(mut self) -> Result<Vec<Segment>, RenderError> {
        let src = self.src;
        let mut pos = 0;
        while let Some(rel) = src[pos..].find("{{") {
            let start = pos + rel;
            self.push_text(&src[pos..start]);

            let mut cursor = start + 2;
            if src[cursor..].starts_with('-') && src[cursor + 1..].starts_with(char::is_whitespace) {
                cursor += 1;
                self.trim_previous_text();
            }

            let (body, end, trim_right) = self.scan_action(start, cursor)?;
            if let Some(body) = body {
                self.segments.push(Segment::Action { body, offset: start });
            }
            self.trim_next = trim_right;
            pos = end;
        }
        self.push_text(&src[pos..]);
        Ok(self.segments)
    }

    /// Scan one action starting after `{{` / `{{-`. Returns the body (`None`
    /// for comments), the offset just past `}}`, and whether `-}}` was used.
    fn scan_action(
        &self,
        start: usize,
        cursor: usize,
    ) -> Result<(Option<String>, usize, bool), RenderError> {
        let src = self.src;
        let rest = &src[cursor..];
        let leading_ws = rest.len() - rest.trim_start().len();

        if rest.trim_start().starts_with("/*") {
            let comment_start = cursor + leading_ws + 2;
            let Some(close) = src[comment_start..].find("*/") else {
                return Err(syntax(self.name, src, start, "unclosed comment"));
            };
            let after = comment_start + close + 2;
            let tail = src[after..].trim_start();
            let mut end = src.len() - tail.len();
            let trim_right = tail.starts_with('-');
            if trim_right {
                end += 1;
            }
            if !src[end..].starts_with("}}") {
                return Err(syntax(self.name, src, start, "comment must end with */}}"));
            }
            return Ok((None, end + 2, trim_right));
        }

        let mut in_string = false;
        let mut escaped = false;
        let mut iter = rest.char_indices().peekable();
        while let Some((i, c)) = iter.next() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '}' if matches!(iter.peek(), Some((_, '}'))) => {
                    let raw = &rest[..i];
                    let trimmed = raw.trim_end();
                    let trim_right = trimmed.ends_with('-')
                        && trimmed[..trimmed.len() - 1]
                            .chars()
                            .last()
                            .is_some_and(char::is_whitespace);
                    let body = if trim_right { &trimmed[..trimmed.len() - 1] } else { raw };
                    return Ok((Some(body.trim().to_owned()), cursor + i + 2, trim_right));
                }
                _ => {}
            }
        }
        let message = if in_string { "unterminated string literal" } else { "unclosed action" };
        Err(syntax(self.name, src, start, message))
    }
}

fn syntax(name: &str, src: &str, offset: usize, message: impl Into<String>) -> RenderError {
    let line = src[..offset.min(src.len())].matches('\n').count() + 1;
    RenderError::Syntax {
        template: name.to_owned(),
        offset,
        line,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Action tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    /// `.name`
    Ref(String),
    Str(String),
    Word(String),
    LParen,
    RParen,
    Pipe,
}

fn tokenize(body: &str) -> Result<Vec<Tok>, String> {
    let mut toks = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            }
            '|' => {
                chars.next();
                toks.push(Tok::Pipe);
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(other) => s.push(other),
                            None => return Err("unterminated string literal".into()),
                        },
                        Some(other) => s.push(other),
                        None => return Err("unterminated string literal".into()),
                    }
                }
                toks.push(Tok::Str(s));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '|' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                match word.strip_prefix('.') {
                    Some(name) if is_ident(name) => toks.push(Tok::Ref(name.to_owned())),
                    Some(_) => return Err(format!("invalid reference '{word}'")),
                    None => toks.push(Tok::Word(word)),
                }
            }
        }
    }
    Ok(toks)
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn reference(name: &str) -> Reference {
    if name == OS_KEY {
        Reference::Os
    } else {
        Reference::Setting(name.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Predicate parsing (recursive descent over one action's tokens)
// ---------------------------------------------------------------------------

enum Operand {
    Ref(Reference),
    Lit(String),
}

struct PredParser<'t> {
    toks: &'t [Tok],
    pos: usize,
}

impl<'t> PredParser<'t> {
    fn new(toks: &'t [Tok]) -> Self {
        Self { toks, pos: 0 }
    }

    fn next(&mut self) -> Option<&'t Tok> {
        let tok = self.toks.get(self.pos);
        self.pos += 1;
        tok
    }

    fn peek(&self) -> Option<&'t Tok> {
        self.toks.get(self.pos)
    }

    fn finish(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(format!("unexpected {tok:?} after predicate")),
        }
    }

    fn predicate(&mut self) -> Result<Predicate, String> {
        match self.next() {
            Some(Tok::LParen) => {
                let inner = self.predicate()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            Some(Tok::Word(w)) if w == "eq" || w == "ne" => {
                let lhs = self.operand()?;
                let rhs = self.operand()?;
                let eq = comparison(lhs, rhs)?;
                Ok(if w == "ne" { Predicate::Not(Box::new(eq)) } else { eq })
            }
            Some(Tok::Word(w)) if w == "not" => Ok(Predicate::Not(Box::new(self.argument()?))),
            Some(Tok::Word(w)) if w == "and" || w == "or" => {
                let mut ops = vec![self.argument()?];
                while matches!(self.peek(), Some(Tok::LParen)) {
                    ops.push(self.argument()?);
                }
                if ops.len() < 2 {
                    return Err(format!("'{w}' needs at least two operands"));
                }
                Ok(if w == "and" { Predicate::And(ops) } else { Predicate::Or(ops) })
            }
            Some(tok) => Err(format!("expected predicate, found {tok:?}")),
            None => Err("expected predicate".into()),
        }
    }

    fn argument(&mut self) -> Result<Predicate, String> {
        match self.next() {
            Some(Tok::LParen) => {
                let inner = self.predicate()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            _ => Err("predicate operands must be parenthesized".into()),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), String> {
        match self.next() {
            Some(Tok::RParen) => Ok(()),
            _ => Err("expected ')'".into()),
        }
    }

    fn operand(&mut self) -> Result<Operand, String> {
        match self.next() {
            Some(Tok::Ref(name)) => Ok(Operand::Ref(reference(name))),
            Some(Tok::Str(s)) => Ok(Operand::Lit(s.clone())),
            Some(Tok::Word(w)) if is_bare_literal(w) => Ok(Operand::Lit(w.clone())),
            Some(tok) => Err(format!("expected key or literal, found {tok:?}")),
            None => Err("expected key or literal".into()),
        }
    }
}

fn is_bare_literal(word: &str) -> bool {
    word == "true" || word == "false" || word.parse::<f64>().is_ok()
}

fn comparison(lhs: Operand, rhs: Operand) -> Result<Predicate, String> {
    let (reference, literal) = match (lhs, rhs) {
        (Operand::Ref(r), Operand::Lit(l)) | (Operand::Lit(l), Operand::Ref(r)) => (r, l),
        _ => return Err("comparisons need exactly one key and one literal".into()),
    };
    Ok(match reference {
        Reference::Os => Predicate::OsEq(OsName::new(literal)),
        Reference::Setting(key) => Predicate::KeyEq { key, value: literal },
    })
}

// ---------------------------------------------------------------------------
// Tree building
// ---------------------------------------------------------------------------

struct Frame {
    /// Closed arms, in order.
    arms: Vec<(Predicate, Vec<Node>)>,
    /// Predicate of the arm being filled; `None` once inside `else`.
    pending: Option<Predicate>,
    open: Vec<Node>,
    offset: usize,
}

impl Frame {
    fn new(pred: Predicate, offset: usize) -> Self {
        Self { arms: Vec::new(), pending: Some(pred), open: Vec::new(), offset }
    }

    fn close_arm(&mut self) -> bool {
        match self.pending.take() {
            Some(pred) => {
                self.arms.push((pred, std::mem::take(&mut self.open)));
                true
            }
            None => false,
        }
    }

    fn into_node(mut self) -> Node {
        let otherwise = if self.close_arm() { Vec::new() } else { self.open };
        Node::Branch { arms: self.arms, otherwise }
    }
}

/// Parse `src` into a node tree. `name` is used in error messages.
pub fn parse(name: &str, src: &str) -> Result<Vec<Node>, RenderError> {
    let segments = Lexer::new(name, src).run()?;

    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for segment in segments {
        let (body, offset) = match segment {
            Segment::Text(text) => {
                current(&mut root, &mut stack).push(Node::Text(text));
                continue;
            }
            Segment::Action { body, offset } => (body, offset),
        };
        let err = |message: String| syntax(name, src, offset, message);
        let toks = tokenize(&body).map_err(err)?;

        match toks.first() {
            Some(Tok::Word(w)) if w == "if" => {
                let mut parser = PredParser::new(&toks[1..]);
                let pred = parser.predicate().map_err(err)?;
                parser.finish().map_err(err)?;
                stack.push(Frame::new(pred, offset));
            }
            Some(Tok::Word(w)) if w == "else" => {
                let Some(frame) = stack.last_mut() else {
                    return Err(err("'else' outside of 'if'".into()));
                };
                let next_pred = match toks.get(1) {
                    None => None,
                    Some(Tok::Word(w)) if w == "if" => {
                        let mut parser = PredParser::new(&toks[2..]);
                        let pred = parser.predicate().map_err(err)?;
                        parser.finish().map_err(err)?;
                        Some(pred)
                    }
                    Some(_) => return Err(err("expected 'else' or 'else if'".into())),
                };
                if !frame.close_arm() {
                    return Err(err("'else' after 'else'".into()));
                }
                frame.pending = next_pred;
            }
            Some(Tok::Word(w)) if w == "end" => {
                if toks.len() > 1 {
                    return Err(err("unexpected tokens after 'end'".into()));
                }
                let Some(frame) = stack.pop() else {
                    return Err(err("'end' without 'if'".into()));
                };
                current(&mut root, &mut stack).push(frame.into_node());
            }
            Some(Tok::Ref(key)) => {
                let default = match &toks[1..] {
                    [] => None,
                    [Tok::Pipe, Tok::Word(f), Tok::Str(d)] if f == "default" => Some(d.clone()),
                    [Tok::Pipe, Tok::Word(f), Tok::Word(d)] if f == "default" && is_bare_literal(d) => {
                        Some(d.clone())
                    }
                    _ => return Err(err("expected '.key' or '.key | default \"value\"'".into())),
                };
                current(&mut root, &mut stack).push(Node::Value { reference: reference(key), default });
            }
            Some(tok) => return Err(err(format!("unknown directive starting with {tok:?}"))),
            None => return Err(err("empty action".into())),
        }
    }

    if let Some(frame) = stack.last() {
        return Err(syntax(name, src, frame.offset, "'if' is never closed with 'end'"));
    }
    Ok(root)
}

fn current<'n>(root: &'n mut Vec<Node>, stack: &'n mut [Frame]) -> &'n mut Vec<Node> {
    match stack.last_mut() {
        Some(frame) => &mut frame.open,
        None => root,
    }
}
