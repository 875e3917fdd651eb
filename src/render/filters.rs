//! Output filters available inside `{{ value | filter }}` tags.
//!
//! | Filter | Effect |
//! |---|---|
//! | `date_to_string` | `05 Nov 2008` |
//! | `date_to_long_string` | `05 November 2008` |
//! | `date_to_xmlschema` | `2008-11-05T00:00:00Z` |
//! | `xml_escape` | escape `& < > " '` |
//! | `cgi_escape` | form-encode (space → `+`) |
//! | `uri_escape` | percent-encode, keeping URI delimiters |
//! | `number_of_words` | whitespace-separated word count |
//! | `before_fold` | content before the first `<!--more-->` |
//! | `to_month`, `to_month_abbr` | `11` → `November` / `Nov` |
//! | `array_to_sentence_string` | `a, b, and c` |
//! | `markdownize` | Markdown → HTML |
//! | `size`, `join`, `downcase`, `upcase` | the usual |

use super::template::TemplateError;
use crate::date;
use serde_json::Value;

/// Marker separating a post's teaser from the rest of its content.
pub const FOLD_MARKER: &str = "<!--more-->";

/// Apply the filter `name` to `input`.
pub fn apply(name: &str, input: &Value, args: &[Value]) -> Result<Value, TemplateError> {
    let text = || super::template::to_output(input);
    let out = match name {
        "date_to_string" => format_date(input, |dt| dt.format("%d %b %Y").to_string()),
        "date_to_long_string" => format_date(input, |dt| dt.format("%d %B %Y").to_string()),
        "date_to_xmlschema" => format_date(input, date::to_xmlschema),
        "xml_escape" => Value::String(xml_escape(&text())),
        "cgi_escape" => Value::String(cgi_escape(&text())),
        "uri_escape" => Value::String(uri_escape(&text())),
        "number_of_words" => Value::from(text().split_whitespace().count()),
        "before_fold" => Value::String(before_fold(&text()).to_string()),
        "to_month" => month(input, date::month_name),
        "to_month_abbr" => month(input, date::month_abbr),
        "array_to_sentence_string" => Value::String(array_to_sentence_string(input)),
        "markdownize" => Value::String(super::convert::markdown_to_html(&text())),
        "size" => Value::from(size(input)),
        "join" => {
            let separator = match args.first() {
                Some(sep) => super::template::to_output(sep),
                None => " ".to_string(),
            };
            Value::String(join(input, &separator))
        }
        "downcase" => Value::String(text().to_lowercase()),
        "upcase" => Value::String(text().to_uppercase()),
        other => return Err(TemplateError::UnknownFilter(other.to_string())),
    };
    Ok(out)
}

fn format_date(input: &Value, format: impl Fn(&chrono::NaiveDateTime) -> String) -> Value {
    match input.as_str().and_then(date::parse_timestamp) {
        Some(dt) => Value::String(format(&dt)),
        None => input.clone(),
    }
}

fn month(input: &Value, lookup: fn(u32) -> Option<&'static str>) -> Value {
    let number = match input {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    number
        .and_then(lookup)
        .map(|name| Value::String(name.to_string()))
        .unwrap_or(Value::Null)
}

pub fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn cgi_escape(input: &str) -> String {
    urlencoding::encode(input).replace("%20", "+")
}

/// Delimiters and sub-delimiters that stay literal in a URI.
const URI_RESERVED: &[(&str, &str)] = &[
    ("%2F", "/"),
    ("%3A", ":"),
    ("%3F", "?"),
    ("%23", "#"),
    ("%5B", "["),
    ("%5D", "]"),
    ("%40", "@"),
    ("%21", "!"),
    ("%24", "$"),
    ("%26", "&"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
    ("%2B", "+"),
    ("%2C", ","),
    ("%3B", ";"),
    ("%3D", "="),
];

pub fn uri_escape(input: &str) -> String {
    URI_RESERVED
        .iter()
        .fold(urlencoding::encode(input).into_owned(), |acc, (enc, lit)| {
            acc.replace(enc, lit)
        })
}

pub fn before_fold(input: &str) -> &str {
    input.split(FOLD_MARKER).next().unwrap_or(input)
}

pub fn array_to_sentence_string(input: &Value) -> String {
    let items: Vec<String> = match input {
        Value::Array(items) => items.iter().map(super::template::to_output).collect(),
        Value::Null => Vec::new(),
        other => vec![super::template::to_output(other)],
    };
    match items.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} and {b}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

fn size(input: &Value) -> usize {
    match input {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        _ => 0,
    }
}

fn join(input: &Value, separator: &str) -> String {
    match input {
        Value::Array(items) => items
            .iter()
            .map(super::template::to_output)
            .collect::<Vec<_>>()
            .join(separator),
        other => super::template::to_output(other),
    }
}
