//! Parser for the subset of Starlark found in build files
//!
//! Only the top level is modelled: `load` statements and calls of the form
//! `kind(key = value, ...)`. Statements that do not fit that shape are kept
//! as source text so hand-written content always survives a rewrite.

use super::{is_keep_comment, Attr, Load, Rule, Stmt, Value, Verbatim};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{}:{}: {}", .path.display(), .line, .message)]
pub struct ParseError {
    pub path: PathBuf,
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Punct(char),
    Comment(String),
    Newline,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    start: usize,
    end: usize,
    line: usize,
    end_line: usize,
}

struct Lexer<'a> {
    path: &'a Path,
    src: &'a str,
    pos: usize,
    line: usize,
    open: Vec<(char, usize)>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            path: self.path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    fn push(&mut self, tok: Tok, start: usize, line: usize) {
        self.tokens.push(Token {
            tok,
            start,
            end: self.pos,
            line,
            end_line: self.line,
        });
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(c) = self.peek() {
            let start = self.pos;
            let line = self.line;
            match c {
                '\n' => {
                    self.bump();
                    if self.open.is_empty() {
                        self.push(Tok::Newline, start, line);
                    }
                }
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\\' if self.src[self.pos..].starts_with("\\\n") => {
                    self.bump();
                    self.bump();
                }
                '#' => {
                    let end = self.src[self.pos..]
                        .find('\n')
                        .map_or(self.src.len(), |i| self.pos + i);
                    let text = self.src[self.pos..end].trim_end().to_string();
                    self.pos = end;
                    self.push(Tok::Comment(text), start, line);
                }
                '"' | '\'' => {
                    let s = self.string(c)?;
                    self.push(Tok::Str(s), start, line);
                }
                c if c.is_ascii_digit() => {
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.bump();
                    }
                    let n = self.src[start..self.pos]
                        .parse::<i64>()
                        .map_err(|_| self.error(line, "integer literal out of range"))?;
                    self.push(Tok::Int(n), start, line);
                }
                c if c.is_alphabetic() || c == '_' => {
                    while self
                        .peek()
                        .is_some_and(|c| c.is_alphanumeric() || c == '_')
                    {
                        self.bump();
                    }
                    let ident = self.src[start..self.pos].to_string();
                    self.push(Tok::Ident(ident), start, line);
                }
                '(' | '[' | '{' => {
                    self.bump();
                    self.open.push((c, line));
                    self.push(Tok::Punct(c), start, line);
                }
                ')' | ']' | '}' => {
                    self.bump();
                    let expected = match self.open.pop() {
                        Some(('(', _)) => ')',
                        Some(('[', _)) => ']',
                        Some(_) => '}',
                        None => return Err(self.error(line, format!("unexpected '{}'", c))),
                    };
                    if c != expected {
                        return Err(self.error(
                            line,
                            format!("expected '{}' but found '{}'", expected, c),
                        ));
                    }
                    self.push(Tok::Punct(c), start, line);
                }
                other => {
                    self.bump();
                    self.push(Tok::Punct(other), start, line);
                }
            }
        }

        if let Some((c, line)) = self.open.last() {
            return Err(self.error(*line, format!("'{}' is never closed", c)));
        }
        Ok(self.tokens)
    }

    fn string(&mut self, quote: char) -> Result<String, ParseError> {
        let line = self.line;
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let is_triple = self.src[self.pos..].starts_with(&triple);
        let opening = if is_triple { 3 } else { 1 };
        for _ in 0..opening {
            self.bump();
        }

        let mut out = String::new();
        loop {
            if is_triple && self.src[self.pos..].starts_with(&triple) {
                for _ in 0..3 {
                    self.bump();
                }
                return Ok(out);
            }
            match self.bump() {
                None => return Err(self.error(line, "unterminated string")),
                Some('\n') if !is_triple => return Err(self.error(line, "unterminated string")),
                Some(c) if c == quote && !is_triple => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(self.error(line, "unterminated string")),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('\n') => {}
                    Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }
}

/// Parses `src` into statements plus comments found after the last one.
pub(super) fn parse(path: &Path, src: &str) -> Result<(Vec<Stmt>, Vec<String>), ParseError> {
    let tokens = Lexer {
        path,
        src,
        pos: 0,
        line: 1,
        open: Vec::new(),
        tokens: Vec::new(),
    }
    .run()?;

    let mut stmts = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i].tok {
            Tok::Newline => {
                // A blank line detaches a comment block from what follows.
                let blank = i > 0 && tokens[i - 1].tok == Tok::Newline;
                if blank && !pending.is_empty() {
                    stmts.push(Stmt::Comments(std::mem::take(&mut pending)));
                }
                i += 1;
            }
            Tok::Comment(text) => {
                pending.push(text.clone());
                i += 1;
            }
            _ => {
                let end = tokens[i..]
                    .iter()
                    .position(|t| t.tok == Tok::Newline)
                    .map_or(tokens.len(), |n| i + n);
                let comments = std::mem::take(&mut pending);
                stmts.push(statement(src, &tokens[i..end], comments));
                i = end;
            }
        }
    }

    Ok((stmts, pending))
}

fn statement(src: &str, toks: &[Token], comments: Vec<String>) -> Stmt {
    let parsed = match (&toks[0].tok, toks.get(1).map(|t| &t.tok)) {
        (Tok::Ident(name), Some(Tok::Punct('('))) if name == "load" => {
            load(toks).map(|mut l| {
                let mut all = comments.clone();
                all.append(&mut l.comments);
                l.comments = all;
                Stmt::Load(l)
            })
        }
        (Tok::Ident(kind), Some(Tok::Punct('('))) => call(src, kind, toks).map(|mut r| {
            let mut all = comments.clone();
            all.append(&mut r.comments);
            r.comments = all;
            Stmt::Rule(r)
        }),
        _ => None,
    };

    parsed.unwrap_or_else(|| {
        let last = &toks[toks.len() - 1];
        Stmt::Verbatim(Verbatim {
            comments,
            text: src[toks[0].start..last.end].to_string(),
        })
    })
}

/// Index of the `)` closing the call opened at `toks[1]`.
fn closing_paren(toks: &[Token]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in toks.iter().enumerate().skip(1) {
        match t.tok {
            Tok::Punct('(' | '[' | '{') => depth += 1,
            Tok::Punct(')' | ']' | '}') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn load(toks: &[Token]) -> Option<Load> {
    let close = closing_paren(toks)?;
    let mut inner = Vec::new();
    let mut suffix = Vec::new();
    for t in &toks[close + 1..] {
        match &t.tok {
            Tok::Comment(c) => suffix.push(c.clone()),
            _ => return None,
        }
    }

    let mut args: Vec<&Tok> = Vec::new();
    for t in &toks[2..close] {
        match &t.tok {
            Tok::Comment(c) => inner.push(c.clone()),
            tok => args.push(tok),
        }
    }
    let mut groups = args.split(|t| **t == Tok::Punct(','));

    let module = match groups.next()? {
        [Tok::Str(m)] => m.clone(),
        _ => return None,
    };
    let mut load = Load::new(module);
    load.comments = inner;
    load.suffix_comment = suffix.pop();
    for group in groups {
        match group {
            [] => {}
            [Tok::Str(sym)] => load.symbols.push((sym.clone(), sym.clone())),
            [Tok::Ident(local), Tok::Punct('='), Tok::Str(orig)] => {
                load.symbols.push((local.clone(), orig.clone()))
            }
            _ => return None,
        }
    }
    Some(load)
}

fn call(src: &str, kind: &str, toks: &[Token]) -> Option<Rule> {
    let close = closing_paren(toks)?;
    let mut rule = Rule::anonymous(kind);

    let close_line = toks[close].end_line;
    for t in &toks[close + 1..] {
        match &t.tok {
            Tok::Comment(c) if t.line == close_line && rule.suffix_comment.is_none() => {
                if is_keep_comment(c) {
                    rule.set_keep(true);
                }
                rule.suffix_comment = Some(c.clone());
            }
            Tok::Comment(c) => rule.comments.push(c.clone()),
            _ => return None,
        }
    }

    let mut pending: Vec<String> = Vec::new();
    let mut prev_line = toks[1].end_line;
    let mut after_value = false;
    let mut i = 2;
    while i < close {
        let t = &toks[i];
        if t.tok == Tok::Punct(',') {
            if !after_value {
                return None;
            }
            after_value = false;
            prev_line = t.end_line;
            i += 1;
            continue;
        }
        if let Tok::Comment(c) = &t.tok {
            let trailing = t.line == prev_line;
            match rule.attrs.last_mut() {
                Some(attr) if trailing && attr.suffix_comment.is_none() => {
                    attr.keep |= is_keep_comment(c);
                    attr.suffix_comment = Some(c.clone());
                }
                None if trailing && is_keep_comment(c) => rule.set_keep(true),
                _ => pending.push(c.clone()),
            }
            i += 1;
            continue;
        }

        let key = match (&t.tok, toks.get(i + 1).map(|t| &t.tok)) {
            (Tok::Ident(key), Some(Tok::Punct('='))) => key.clone(),
            _ => return None,
        };

        let value_start = i + 2;
        let mut depth = 0usize;
        let mut end = value_start;
        while end < close {
            match toks[end].tok {
                Tok::Punct('(' | '[' | '{') => depth += 1,
                Tok::Punct(')' | ']' | '}') => depth -= 1,
                Tok::Punct(',') if depth == 0 => break,
                _ => {}
            }
            end += 1;
        }

        // Comments between the value and the next comma belong after it.
        let value_end = toks[value_start..end]
            .iter()
            .rposition(|t| !matches!(t.tok, Tok::Comment(_)))
            .map(|n| value_start + n + 1)?;
        let value_toks = &toks[value_start..value_end];
        let (value, keep) = value(src, value_toks)?;

        rule.push_attr(Attr {
            key,
            value,
            comments: std::mem::take(&mut pending),
            suffix_comment: None,
            keep,
        });

        prev_line = toks[value_end - 1].end_line;
        after_value = true;
        i = value_end;
    }
    rule.end_comments = pending;

    Some(rule)
}

/// Parses an attribute value. A value with comments inside is kept as
/// source text so the comments are printed back.
fn value(src: &str, toks: &[Token]) -> Option<(Value, bool)> {
    let (first, last) = (toks.first()?, toks.last()?);
    let raw = || Value::Raw(src[first.start..last.end].to_string());

    let comments: Vec<&str> = toks
        .iter()
        .filter_map(|t| match &t.tok {
            Tok::Comment(c) => Some(c.as_str()),
            _ => None,
        })
        .collect();
    if !comments.is_empty() {
        let keep = comments.iter().any(|c| is_keep_comment(c));
        return Some((raw(), keep));
    }

    let value = match toks.iter().map(|t| &t.tok).collect::<Vec<_>>().as_slice() {
        [Tok::Str(s)] if !is_triple_quoted(&src[first.start..]) => Value::String(s.clone()),
        [Tok::Ident(b)] if b == "True" => Value::Bool(true),
        [Tok::Ident(b)] if b == "False" => Value::Bool(false),
        [Tok::Int(n)] => Value::Int(*n),
        [Tok::Punct('-'), Tok::Int(n)] => Value::Int(-n),
        [Tok::Punct('['), inner @ .., Tok::Punct(']')] => match string_list(inner) {
            Some(items) => Value::List(items),
            None => raw(),
        },
        _ => raw(),
    };
    Some((value, false))
}

fn is_triple_quoted(s: &str) -> bool {
    s.starts_with("\"\"\"") || s.starts_with("'''")
}

fn string_list(inner: &[&Tok]) -> Option<Vec<String>> {
    let mut items = Vec::new();
    let mut expect_item = true;
    for tok in inner {
        match (tok, expect_item) {
            (Tok::Str(s), true) => {
                items.push(s.clone());
                expect_item = false;
            }
            (Tok::Punct(','), false) => expect_item = true,
            _ => return None,
        }
    }
    Some(items)
}
