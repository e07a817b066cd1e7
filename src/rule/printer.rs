//! Canonical build file printer
//!
//! Output follows buildifier conventions closely enough that printing a
//! parsed canonical file reproduces it byte for byte.

use super::{is_keep_comment, Attr, Load, Rule, Stmt, Value};
use std::fmt::Write;

const INDENT: &str = "    ";

pub(super) fn print(stmts: &[Stmt], trailing_comments: &[String]) -> String {
    let mut out = String::new();
    let mut prev_was_load = false;

    for stmt in stmts {
        let is_load = matches!(stmt, Stmt::Load(_));
        if !out.is_empty() && !(prev_was_load && is_load) {
            out.push('\n');
        }
        match stmt {
            Stmt::Load(l) => print_load(&mut out, l),
            Stmt::Rule(r) => print_rule(&mut out, r),
            Stmt::Comments(c) => print_comments(&mut out, c, ""),
            Stmt::Verbatim(v) => {
                print_comments(&mut out, &v.comments, "");
                out.push_str(&v.text);
                out.push('\n');
            }
        }
        prev_was_load = is_load;
    }

    if !trailing_comments.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        print_comments(&mut out, trailing_comments, "");
    }
    out
}

fn print_comments(out: &mut String, comments: &[String], indent: &str) {
    for c in comments {
        let _ = writeln!(out, "{}{}", indent, c);
    }
}

fn print_load(out: &mut String, load: &Load) {
    print_comments(out, &load.comments, "");
    let mut symbols = load.symbols.clone();
    symbols.sort();

    out.push_str("load(");
    out.push_str(&quote(&load.module));
    for (local, orig) in &symbols {
        out.push_str(", ");
        if local == orig {
            out.push_str(&quote(local));
        } else {
            let _ = write!(out, "{} = {}", local, quote(orig));
        }
    }
    out.push(')');
    if let Some(c) = &load.suffix_comment {
        let _ = write!(out, "  {}", c);
    }
    out.push('\n');
}

/// `name` first, the rest in their stored order.
fn ordered_attrs(rule: &Rule) -> Vec<&Attr> {
    let mut attrs: Vec<&Attr> = rule.attrs().iter().collect();
    attrs.sort_by_key(|a| a.key != "name");
    attrs
}

fn fits_on_one_line(rule: &Rule) -> bool {
    match rule.attrs() {
        [] => rule.end_comments.is_empty(),
        [attr] => {
            rule.end_comments.is_empty()
                && attr.comments.is_empty()
                && attr.suffix_comment.is_none()
                && !matches!(&attr.value, Value::List(items) if items.len() > 1)
                && !matches!(&attr.value, Value::Raw(raw) if raw.contains('\n'))
        }
        _ => false,
    }
}

fn print_rule(out: &mut String, rule: &Rule) {
    print_comments(out, &rule.comments, "");
    let suffix = rule
        .suffix_comment
        .as_ref()
        .map(|c| format!("  {}", c))
        .unwrap_or_default();
    // A keep marker not written after `)` goes on the opening line.
    let suffix_keeps = rule.suffix_comment.as_deref().is_some_and(is_keep_comment);
    let head_keep = if rule.has_keep() && !suffix_keeps {
        "  # keep"
    } else {
        ""
    };

    if fits_on_one_line(rule) {
        out.push_str(rule.kind());
        out.push('(');
        if let Some(attr) = rule.attrs().first() {
            let _ = write!(out, "{} = {}", attr.key, format_value(&attr.value, ""));
        }
        let _ = writeln!(out, "){}{}", head_keep, suffix);
        return;
    }

    let _ = writeln!(out, "{}({}", rule.kind(), head_keep);
    for attr in ordered_attrs(rule) {
        print_comments(out, &attr.comments, INDENT);
        let _ = write!(
            out,
            "{}{} = {},",
            INDENT,
            attr.key,
            format_value(&attr.value, INDENT)
        );
        if let Some(c) = &attr.suffix_comment {
            let _ = write!(out, "  {}", c);
        }
        out.push('\n');
    }
    print_comments(out, &rule.end_comments, INDENT);
    let _ = writeln!(out, "){}", suffix);
}

fn format_value(value: &Value, indent: &str) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Raw(raw) => raw.clone(),
        Value::List(items) => match items.as_slice() {
            [] => "[]".to_string(),
            [single] => format!("[{}]", quote(single)),
            _ => {
                let mut s = String::from("[\n");
                for item in items {
                    let _ = writeln!(s, "{}{}{},", indent, INDENT, quote(item));
                }
                s.push_str(indent);
                s.push(']');
                s
            }
        },
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
