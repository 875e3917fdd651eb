//! Permalink templates and token substitution.
//!
//! A template such as `/:categories/:year/:month/:day/:title.html` is
//! expanded once per entity. Supported tokens:
//!
//! | Token | Value |
//! |---|---|
//! | `:year` | 4-digit year |
//! | `:month`, `:day` | zero-padded 2-digit month/day |
//! | `:i_month`, `:i_day` | un-padded month/day |
//! | `:title` | percent-escaped slug |
//! | `:categories` | categories joined by `/` |
//! | `:output_ext` | output extension, e.g. `.html` |
//!
//! Runs of `/` left behind by empty tokens (typically `:categories`) are
//! collapsed into one.

use chrono::{Datelike, NaiveDateTime};

/// Attribute values substituted into a template.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    pub date: &'a NaiveDateTime,
    pub slug: &'a str,
    pub categories: &'a [String],
    pub output_ext: &'a str,
}

/// Expand `template` with the given tokens.
pub fn expand(template: &str, tokens: &Tokens<'_>) -> String {
    let date = tokens.date;
    let replacements = [
        (":year", format!("{:04}", date.year())),
        (":month", format!("{:02}", date.month())),
        (":day", format!("{:02}", date.day())),
        (":title", escape(tokens.slug)),
        (":i_day", date.day().to_string()),
        (":i_month", date.month().to_string()),
        (":categories", tokens.categories.join("/")),
        (":output_ext", tokens.output_ext.to_string()),
    ];
    let expanded = replacements
        .iter()
        .fold(template.to_string(), |acc, (token, value)| {
            acc.replace(token, value)
        });
    collapse_slashes(&expanded)
}

/// Collapse every run of `/` into a single separator.
pub fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !previous_slash {
                out.push(c);
            }
            previous_slash = true;
        } else {
            out.push(c);
            previous_slash = false;
        }
    }
    out
}

/// Percent-escape a path component.
pub fn escape(component: &str) -> String {
    urlencoding::encode(component).into_owned()
}

/// Undo [`escape`] so the on-disk filename matches the author's slug.
/// Malformed escapes are kept literally.
pub fn unescape(path: &str) -> String {
    urlencoding::decode(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Whether a template or path names an explicit file extension in its last
/// segment. `/a/b/` and `/a/:title` do not; `/a/:title.html` and
/// `/a/:title:output_ext` do.
pub fn has_explicit_extension(path: &str) -> bool {
    let last = match path.rsplit_once('/') {
        Some((_, last)) => last,
        None => path,
    };
    !last.is_empty() && (last.ends_with(":output_ext") || last.contains('.'))
}

/// The directory portion of a URL path, ignoring a trailing slash:
/// `/2008/11/05/post.html` → `/2008/11/05`, `/a/b/` → `/a`, `/x` → `/`.
pub fn url_dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((dir, _)) => dir,
    }
}

/// Join a URL directory and a name with exactly one separator.
pub fn url_join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
