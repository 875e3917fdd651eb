//! Centralized filename parsing for the `YYYY-MM-DD-slug.ext` convention.
//!
//! Every collection entry (posts, photos) is named after its publication
//! date and slug, optionally below sub-directories:
//!
//! - `2008-11-05-my-post.md` → date 2008-11-05, slug `my-post`, ext `.md`
//! - `rust/2008-11-05-my-post.md` → same, with sub-path categories `["rust"]`
//!
//! Names that do not match are not collection entries. They are skipped by
//! the collection reader without error.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Result of parsing a dated entry name like `rust/2008-11-05-my-post.md`.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedName {
    /// Directory segments in front of the filename, empty ones dropped.
    pub sub_path: Vec<String>,
    pub date: NaiveDate,
    /// Everything between the date and the extension.
    pub slug: String,
    /// Extension including the leading dot.
    pub ext: String,
}

static MATCHER: OnceLock<Regex> = OnceLock::new();

fn matcher() -> &'static Regex {
    MATCHER.get_or_init(|| {
        Regex::new(r"^((?:[^/]+/)*)(\d+-\d+-\d+)-([^/]*)(\.[^./]+)$").expect("valid entry regex")
    })
}

/// Whether `name` follows the dated entry convention.
pub fn is_dated_name(name: &str) -> bool {
    parse_dated_name(name).is_some()
}

/// Parse a dated entry name. Returns `None` when the name does not match the
/// convention or its date is not a real calendar date.
pub fn parse_dated_name(name: &str) -> Option<DatedName> {
    let normalized = name.replace('\\', "/");
    let caps = matcher().captures(&normalized)?;
    let date = crate::date::parse_date(&caps[2])?;
    let sub_path = caps[1]
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Some(DatedName {
        sub_path,
        date,
        slug: caps[3].to_string(),
        ext: caps[4].to_string(),
    })
}

/// Display title derived from a slug: dash-separated words, capitalized.
///
/// - `my-awesome-post` → "My Awesome Post"
pub fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
