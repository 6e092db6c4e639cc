// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom environment variable templates.
//!
//! `customEnvVar` entries are rendered with minijinja against the template
//! context assembled by the materializer. Go-template style expressions are
//! accepted inside `{{ ... }}` and rewritten before rendering:
//!
//! - `{{ .db.status.host }}` becomes `{{ db.status.host }}`
//! - `{{ index . "v1alpha1" "postgresql.example.dev" }}` becomes
//!   `{{ index(__root__, "v1alpha1", "postgresql.example.dev") }}`
//!
//! Plain minijinja syntax (filters, `index(...)` calls) works unchanged.
//! References that do not resolve render as empty strings.
//!
//! # Example
//!
//! ```rust
//! use service_binding_operator::custom_env::CustomEnvEngine;
//! use serde_json::json;
//!
//! let engine = CustomEnvEngine::new();
//! let ctx = json!({"db": {"status": {"host": "10.0.0.5", "port": 5432}}});
//! let out = engine.render("pg://{{ .db.status.host }}:{{ .db.status.port }}", &ctx).unwrap();
//! assert_eq!(out, "pg://10.0.0.5:5432");
//! ```

use crate::binding_errors::BindingError;
use crate::crd::CustomEnvVar;
use minijinja::value::{Rest, Value};
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior};
use std::collections::BTreeMap;

/// Context key bound to the whole template context (Go's `.`).
const ROOT: &str = "__root__";

/// Renders custom environment variable templates.
pub struct CustomEnvEngine {
    env: Environment<'static>,
}

impl Default for CustomEnvEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomEnvEngine {
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.add_function("index", index);
        env.add_filter("json", json);
        Self { env }
    }

    /// Render `template` against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns a minijinja error for syntax errors and failing filters or functions.
    pub fn render(&self, template: &str, ctx: &serde_json::Value) -> Result<String, Error> {
        let mut root = match ctx {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        root.insert(ROOT.to_string(), ctx.clone());

        self.env
            .render_str(&rewrite_template(template), serde_json::Value::Object(root))
    }
}

/// Render every custom variable. Names are used verbatim as keys.
///
/// # Errors
///
/// Returns [`BindingError::Template`] naming the variable that failed to render.
pub fn render_custom_env_vars(
    vars: &[CustomEnvVar],
    ctx: &serde_json::Value,
) -> Result<BTreeMap<String, String>, BindingError> {
    let engine = CustomEnvEngine::new();
    vars.iter()
        .map(|var| {
            engine
                .render(&var.value, ctx)
                .map(|rendered| (var.name.clone(), rendered))
                .map_err(|source| BindingError::Template {
                    name: var.name.clone(),
                    source,
                })
        })
        .collect()
}

/// `index(value, key, ...)`: successive item lookups, undefined once a key is missing.
fn index(value: Value, keys: Rest<Value>) -> Result<Value, Error> {
    let mut current = value;
    for key in keys.iter() {
        if current.is_undefined() || current.is_none() {
            return Ok(Value::UNDEFINED);
        }
        current = current.get_item(key)?;
    }
    Ok(current)
}

/// `value | json`: JSON serialization of a value.
fn json(value: Value) -> Result<String, Error> {
    serde_json::to_string(&value).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot serialize value to JSON: {e}"),
        )
    })
}

/// Rewrite the Go-style expressions of every `{{ ... }}` block.
fn rewrite_template(template: &str) -> String {
    let mut result = String::with_capacity(template.len());
    let mut remaining = template;

    while let Some(start) = remaining.find("{{") {
        result.push_str(&remaining[..start + 2]);
        remaining = &remaining[start + 2..];

        let Some(end) = remaining.find("}}") else {
            break;
        };
        result.push_str(&rewrite_expression(&remaining[..end]));
        result.push_str("}}");
        remaining = &remaining[end + 2..];
    }

    result.push_str(remaining);
    result
}

fn rewrite_expression(expression: &str) -> String {
    // Whitespace control markers must stay attached to the delimiters.
    let (open, inner) = match expression.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", expression),
    };
    let (inner, close) = match inner.strip_suffix('-') {
        Some(rest) => (rest, "-"),
        None => (inner, ""),
    };

    let trimmed = inner.trim();
    let body = match trimmed.strip_prefix("index ") {
        Some(args) => {
            let args: Vec<String> = split_args(args)
                .iter()
                .map(|arg| rewrite_operands(arg))
                .collect();
            format!("index({})", args.join(", "))
        }
        None => rewrite_operands(trimmed),
    };
    format!("{open} {body} {close}")
}

/// Drop the leading dot of field chains (`.a.b` -> `a.b`) and turn a bare `.`
/// into the root binding. Quoted strings are left alone.
fn rewrite_operands(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len() + ROOT.len());
    let mut quote: Option<char> = None;
    let mut chars = expression.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            out.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                out.push(ch);
            }
            '.' if !out
                .chars()
                .last()
                .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | ')' | ']')) =>
            {
                if !chars.peek().is_some_and(|c| c.is_alphabetic() || *c == '_') {
                    out.push_str(ROOT);
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Split Go call arguments on whitespace outside quotes.
fn split_args(args: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in args.chars() {
        match (quote, ch) {
            (Some(q), c) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            (None, c) => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

#[cfg(test)]
#[path = "custom_env_tests.rs"]
mod custom_env_tests;
