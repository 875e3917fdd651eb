//! Front matter detection and parsing.
//!
//! A document carries front matter when its first three bytes are `---`.
//! The header runs until the next line consisting of `---` and is parsed as
//! YAML into an arbitrary key/value map. Everything after it is the body.

use regex::Regex;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// The document-header marker.
pub const MARKER: &[u8; 3] = b"---";

#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Front matter must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

static FRONT_MATTER_REGEX: OnceLock<Regex> = OnceLock::new();

fn front_matter_regex() -> &'static Regex {
    FRONT_MATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)^---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|$)(.*)$")
            .expect("valid front matter regex")
    })
}

/// Whether the file at `path` starts with the document-header marker.
///
/// Only the first three bytes are read.
pub fn has_front_matter(path: &Path) -> io::Result<bool> {
    let mut head = [0u8; 3];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < head.len() {
        match file.read(&mut head[filled..])? {
            0 => return Ok(false),
            n => filled += n,
        }
    }
    Ok(&head == MARKER)
}

/// Parsed front matter: an arbitrary string-keyed map.
///
/// `title`, `permalink`, `date`, `published`, `layout`, `tag`/`tags` and
/// `category`/`categories` carry meaning for the build; everything else is
/// passed through to templates untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    data: Map<String, Value>,
}

impl FrontMatter {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// A value rendered as a string: strings verbatim, numbers and booleans
    /// via their display form. Null and compound values yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(Value::as_bool)
    }

    /// Merge the singular and plural forms of a list-valued key.
    ///
    /// The singular key contributes one value; the plural key contributes a
    /// YAML list, or a whitespace-separated string. Duplicates are dropped,
    /// first occurrence wins.
    pub fn pluralized(&self, singular: &str, plural: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut push = |value: String| {
            if !value.is_empty() && !out.contains(&value) {
                out.push(value);
            }
        };
        if let Some(value) = self.get_str(singular) {
            push(value);
        }
        match self.data.get(plural) {
            Some(Value::String(s)) => s.split_whitespace().for_each(|v| push(v.to_string())),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(scalar_to_string)
                .for_each(&mut push),
            Some(other) => {
                if let Some(v) = scalar_to_string(other) {
                    push(v)
                }
            }
            None => {}
        }
        out
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.data)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Split a document into its front matter and body.
///
/// Documents without a header yield empty front matter and the full content
/// as body.
pub fn split(content: &str) -> Result<(FrontMatter, String), FrontMatterError> {
    let Some(caps) = front_matter_regex().captures(content) else {
        return Ok((FrontMatter::default(), content.to_string()));
    };
    let yaml = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

    if yaml.trim().is_empty() {
        return Ok((FrontMatter::default(), body.to_string()));
    }
    let data = match serde_yaml::from_str::<Value>(yaml)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        Value::Array(_) => return Err(FrontMatterError::NotAMapping("a list")),
        _ => return Err(FrontMatterError::NotAMapping("a scalar")),
    };
    Ok((FrontMatter::new(data), body.to_string()))
}
