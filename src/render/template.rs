//! Template engine seam and the built-in placeholder engine.
//!
//! The build only needs one operation from a template engine: render a
//! template string against a [`Payload`]. [`TemplateEngine`] captures that,
//! so engines can be swapped without touching the pipeline.
//!
//! [`PlaceholderEngine`] is the default. It substitutes output tags of the
//! form `{{ path.to.value | filter | filter: arg, arg }}` and leaves
//! everything else, including `{% ... %}` tags, untouched. It reads the
//! payload layers in place. For loops and conditionals use
//! [`LiquidEngine`](super::LiquidEngine).

use crate::payload::Payload;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),
    #[error("Malformed expression `{0}`")]
    Syntax(String),
    #[error("Liquid error: {0}")]
    Liquid(String),
}

/// Trait for template engines.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, payload: &Payload<'_>) -> Result<String, TemplateError>;
}

/// Output-tag substitution against the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderEngine;

static OUTPUT_TAG: OnceLock<Regex> = OnceLock::new();

fn output_tag() -> &'static Regex {
    OUTPUT_TAG.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("valid output tag regex"))
}

impl TemplateEngine for PlaceholderEngine {
    fn render(&self, template: &str, payload: &Payload<'_>) -> Result<String, TemplateError> {
        let mut failure = None;
        let rendered = output_tag().replace_all(template, |caps: &Captures| {
            match evaluate(caps[1].trim(), payload) {
                Ok(value) => to_output(&value),
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(rendered.into_owned()),
        }
    }
}

/// Evaluate `operand | filter: args | ...` against the payload.
pub fn evaluate(expression: &str, payload: &Payload<'_>) -> Result<Value, TemplateError> {
    let mut stages = split_outside_quotes(expression, '|').into_iter();
    let operand = stages
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TemplateError::Syntax(expression.to_string()))?;

    let mut value = resolve_operand(&operand, payload);
    for stage in stages {
        let stage = stage.trim();
        let (name, args) = match stage.split_once(':') {
            Some((name, args)) => (
                name.trim(),
                split_outside_quotes(args, ',')
                    .iter()
                    .map(|a| resolve_operand(a.trim(), payload))
                    .collect::<Vec<_>>(),
            ),
            None => (stage, Vec::new()),
        };
        if name.is_empty() {
            return Err(TemplateError::Syntax(expression.to_string()));
        }
        value = super::filters::apply(name, &value, &args)?;
    }
    Ok(value)
}

/// A quoted string literal, a number, or a dotted payload path.
fn resolve_operand(operand: &str, payload: &Payload<'_>) -> Value {
    if let Some(literal) = unquote(operand) {
        return Value::String(literal.to_string());
    }
    if let Ok(n) = operand.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = operand.parse::<f64>() {
        return Value::from(f);
    }
    match operand {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    payload.get(operand).cloned().unwrap_or(Value::Null)
}

fn unquote(operand: &str) -> Option<&str> {
    ['"', '\''].iter().find_map(|&q| {
        operand
            .strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
    })
}

/// How a value is written into rendered output.
pub fn to_output(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(to_output).collect(),
        Value::Object(_) => value.to_string(),
    }
}

fn split_outside_quotes(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, c) if c == separator => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}
