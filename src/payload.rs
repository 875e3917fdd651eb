//! Template payload assembly.
//!
//! Every render sees one JSON object with two top-level keys:
//!
//! ```text
//! {
//!   "site": { <config>, <extra>, "time", "posts", "photos", "collated_posts",
//!             "pages", "html_pages", "categories", "tags",
//!             "related_posts" | "related_photos" },
//!   "page": { <front matter>, "title", "url", "date", "content", ... }
//! }
//! ```
//!
//! The site half is built once per render phase by [`SitePayload`] and shared
//! by reference. Each document gets a [`Payload`] that layers its own keys
//! (`page`, `content`, per-document `site` keys) over that shared value, so
//! rendering a document never copies the site payload.

use crate::config::SiteConfig;
use serde_json::{Map, Value, json};

/// Recursively merge `overlay` on top of `base`.
///
/// - Objects are merged key-by-key (overlay keys override base keys).
/// - Non-object values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Convert a TOML value for use in templates. Datetimes become their
/// string form.
pub fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}

/// The configuration as seen by templates: every config key, with the
/// `[extra]` table flattened on top so `site.title` works.
pub fn config_view(config: &SiteConfig) -> Value {
    let mut map = Map::new();
    map.insert(
        "source".into(),
        Value::String(config.source.to_string_lossy().into_owned()),
    );
    map.insert(
        "destination".into(),
        Value::String(config.destination.to_string_lossy().into_owned()),
    );
    map.insert("permalink".into(), Value::String(config.permalink.clone()));
    map.insert("exclude".into(), json!(config.exclude));
    map.insert("include".into(), json!(config.include));
    map.insert("future".into(), Value::Bool(config.future));
    map.insert("limit_posts".into(), json!(config.limit_posts));
    map.insert("related_posts_enabled".into(), Value::Bool(config.related_posts));
    map.insert("multiviews".into(), Value::Bool(config.multiviews));
    map.insert("markdown_ext".into(), json!(config.markdown_ext));
    for (key, value) in &config.extra {
        map.insert(key.clone(), toml_to_json(value));
    }
    Value::Object(map)
}

/// Site-wide payload, built from already-serialized parts.
#[derive(Debug, Default)]
pub struct SitePayload {
    pub config: Value,
    pub time: String,
    pub posts: Vec<Value>,
    pub photos: Vec<Value>,
    pub collated_posts: Value,
    pub pages: Vec<Value>,
    pub html_pages: Vec<Value>,
    pub categories: Map<String, Value>,
    pub tags: Map<String, Value>,
}

impl SitePayload {
    /// `{"site": {...}}`. Computed keys win over config keys of the same name.
    pub fn into_value(self) -> Value {
        let computed = json!({
            "time": self.time,
            "posts": self.posts,
            "photos": self.photos,
            "collated_posts": self.collated_posts,
            "pages": self.pages,
            "html_pages": self.html_pages,
            "categories": self.categories,
            "tags": self.tags,
        });
        json!({ "site": deep_merge(self.config, computed) })
    }
}

/// A document's template payload: small per-document layers over a shared
/// root value.
///
/// Lookups of `site.<key>` check the shared `site` object first and then the
/// document's own site keys, so site keys win. Every other top-level key
/// checks the document's locals first.
#[derive(Debug, Clone)]
pub struct Payload<'a> {
    root: &'a Value,
    site_local: Map<String, Value>,
    locals: Map<String, Value>,
}

impl<'a> Payload<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            site_local: Map::new(),
            locals: Map::new(),
        }
    }

    /// Set a top-level key such as `page` or `content`.
    pub fn insert(&mut self, key: &str, value: Value) {
        self.locals.insert(key.to_string(), value);
    }

    /// Set a `site.<key>` that only this document sees.
    pub fn insert_site(&mut self, key: &str, value: Value) {
        self.site_local.insert(key.to_string(), value);
    }

    /// Remove a top-level key from the locals, falling back to a copy of the
    /// root's value.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.locals
            .remove(key)
            .or_else(|| self.root.get(key).cloned())
    }

    /// Resolve a dotted path across the layers.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let (head, rest) = split_head(path);
        let (base, rest) = if head == "site" {
            let site = self.root.get("site");
            let Some(rest) = rest else {
                return site;
            };
            let (key, tail) = split_head(rest);
            let value = site
                .and_then(|s| s.get(key))
                .or_else(|| self.site_local.get(key))?;
            (value, tail)
        } else {
            (self.locals.get(head).or_else(|| self.root.get(head))?, rest)
        };
        match rest {
            Some(rest) => lookup(base, rest),
            None => Some(base),
        }
    }

    /// The payload as a single object. Copies the whole root, so it is meant
    /// for engines that cannot read the layers directly.
    pub fn to_value(&self) -> Value {
        let mut root = match self.root {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if !self.site_local.is_empty() {
            let site = root
                .remove("site")
                .unwrap_or_else(|| Value::Object(Map::new()));
            root.insert(
                "site".into(),
                deep_merge(Value::Object(self.site_local.clone()), site),
            );
        }
        for (key, value) in &self.locals {
            root.insert(key.clone(), value.clone());
        }
        Value::Object(root)
    }
}

fn split_head(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

/// Walk a dotted path. Numeric segments index arrays; `first` and `last`
/// pick the ends of an array.
pub fn lookup<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => match segment {
            "first" => items.first(),
            "last" => items.last(),
            index => index.parse::<usize>().ok().and_then(|i| items.get(i)),
        },
        _ => None,
    })
}

/// A document's payload over the shared site payload.
///
/// `site_local` carries per-document site keys such as `related_posts`,
/// which the site payload never defines.
pub fn document_payload<'a>(
    site: &'a Value,
    page: Value,
    site_local: Map<String, Value>,
) -> Payload<'a> {
    let mut payload = Payload::new(site);
    payload.insert("page", page);
    payload.site_local = site_local;
    payload
}
