//! Dated content entities: posts and photos.
//!
//! Both kinds share one type. They differ only in the collection directory
//! they are read from and the payload keys they are exposed under, which
//! [`EntityKind::spec`] captures.
//!
//! An entity's identity comes from its file name
//! (`[sub/dirs/]YYYY-MM-DD-slug.ext`, see [`crate::naming`]), optionally
//! refined by front matter:
//!
//! | Front matter | Effect |
//! |---|---|
//! | `date` | replaces the file name date (adds a time of day) |
//! | `permalink` | replaces the permalink template entirely |
//! | `published: false` | drops the entity at read time |
//! | `tag` / `tags` | merged into `tags` |
//! | `category` / `categories` | used when the path yields no categories |
//! | `layout` | first layout of the render chain |

use crate::config::PermalinkStyle;
use crate::date;
use crate::frontmatter::{self, FrontMatter, FrontMatterError};
use crate::naming;
use crate::payload;
use crate::permalink::{self, Tokens};
use crate::render::{Converters, Document, RenderError, Rendered, Renderer, filters};
use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum EntityError {
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Front matter error in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        source: FrontMatterError,
    },
    #[error("Invalid date `{value}` in {path}")]
    InvalidDate { path: PathBuf, value: String },
    #[error("{0} was rendered twice")]
    AlreadyRendered(String),
    #[error("{0} has not been rendered")]
    NotRendered(String),
    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Post,
    Photo,
}

/// Per-kind configuration.
#[derive(Debug)]
pub struct KindSpec {
    /// Collection directory name, e.g. `_posts`.
    pub dir: &'static str,
    /// Key of the collection in the `site` payload.
    pub collection: &'static str,
    /// Key of the related-content list in the `site` payload.
    pub related_key: &'static str,
}

const POST_SPEC: KindSpec = KindSpec {
    dir: "_posts",
    collection: "posts",
    related_key: "related_posts",
};

const PHOTO_SPEC: KindSpec = KindSpec {
    dir: "_photos",
    collection: "photos",
    related_key: "related_photos",
};

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Post, EntityKind::Photo];

    pub fn spec(self) -> &'static KindSpec {
        match self {
            EntityKind::Post => &POST_SPEC,
            EntityKind::Photo => &PHOTO_SPEC,
        }
    }
}

/// Build-wide settings every entity is constructed with.
#[derive(Debug, Clone, Copy)]
pub struct EntityContext<'a> {
    pub permalink: &'a PermalinkStyle,
    pub multiviews: bool,
    pub converters: &'a Converters,
}

/// A post or photo.
///
/// Equality and ordering consider only `(date, slug)`.
#[derive(Debug, Clone)]
pub struct Entity {
    pub kind: EntityKind,
    /// Source file on disk.
    pub source: PathBuf,
    /// Path relative to the collection directory, e.g. `rust/2008-11-05-x.md`.
    pub name: String,
    pub date: NaiveDateTime,
    pub slug: String,
    /// Source extension, with the leading dot.
    pub ext: String,
    /// Extension of the converted output, e.g. `.html`.
    pub output_ext: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub published: bool,
    pub data: FrontMatter,
    /// Body as read, before any rendering.
    pub body: String,
    generated_path: String,
    index_file: bool,
    multiviews: bool,
    rendered: OnceLock<Rendered>,
}

impl Entity {
    /// Read the entity named `name` from `collection_dir`.
    ///
    /// Returns `Ok(None)` when `name` does not follow the dated naming
    /// convention; such files are not entities of this kind. Files that are
    /// not UTF-8 text (a dated `.jpg` in `_photos/`) are skipped with a
    /// warning.
    pub fn read(
        kind: EntityKind,
        collection_dir: &Path,
        dir_categories: &[String],
        name: &str,
        ctx: &EntityContext<'_>,
    ) -> Result<Option<Self>, EntityError> {
        if !naming::is_dated_name(name) {
            return Ok(None);
        }
        let path = collection_dir.join(name);
        let bytes = fs::read(&path).map_err(|source| EntityError::Read {
            path: path.clone(),
            source,
        })?;
        let Ok(raw) = String::from_utf8(bytes) else {
            warn!(path = %path.display(), "not UTF-8 text, skipping");
            return Ok(None);
        };
        Self::from_source(kind, dir_categories, name, &raw, path, ctx)
    }

    /// Build an entity from already-read content.
    ///
    /// `dir_categories` are the directory segments above the collection
    /// directory; segments of `name` below it are appended.
    pub fn from_source(
        kind: EntityKind,
        dir_categories: &[String],
        name: &str,
        raw: &str,
        source: PathBuf,
        ctx: &EntityContext<'_>,
    ) -> Result<Option<Self>, EntityError> {
        let Some(parsed) = naming::parse_dated_name(name) else {
            return Ok(None);
        };
        let (data, body) = frontmatter::split(raw).map_err(|e| EntityError::FrontMatter {
            path: source.clone(),
            source: e,
        })?;

        let date = match data.get("date") {
            Some(value) => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                date::parse_timestamp(&text).ok_or_else(|| EntityError::InvalidDate {
                    path: source.clone(),
                    value: text,
                })?
            }
            None => parsed.date.and_time(chrono::NaiveTime::MIN),
        };

        let mut categories: Vec<String> = dir_categories
            .iter()
            .chain(parsed.sub_path.iter())
            .filter(|c| !c.is_empty())
            .cloned()
            .collect();
        if categories.is_empty() {
            categories = data.pluralized("category", "categories");
        }

        let output_ext = ctx.converters.output_ext(&parsed.ext);
        let template = ctx.permalink.template();
        let generated_path = match data.get_str("permalink") {
            Some(explicit) => explicit,
            None => permalink::expand(
                template,
                &Tokens {
                    date: &date,
                    slug: &parsed.slug,
                    categories: &categories,
                    output_ext: &output_ext,
                },
            ),
        };
        let index_file = !permalink::has_explicit_extension(template)
            || !permalink::has_explicit_extension(&generated_path);

        Ok(Some(Self {
            kind,
            source,
            name: name.replace('\\', "/"),
            date,
            slug: parsed.slug,
            ext: parsed.ext,
            output_ext,
            categories,
            tags: data.pluralized("tag", "tags"),
            published: data.get_bool("published") != Some(false),
            data,
            body,
            generated_path,
            index_file,
            multiviews: ctx.multiviews,
            rendered: OnceLock::new(),
        }))
    }

    /// `(date, slug)` comparison.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.slug.cmp(&other.slug))
    }

    /// The path this entity is generated at, relative to the site root.
    pub fn generated_path(&self) -> &str {
        &self.generated_path
    }

    /// Public URL: the generated path, minus `.html` under multiviews.
    pub fn url(&self) -> String {
        match self.generated_path.strip_suffix(".html") {
            Some(stripped) if self.multiviews => stripped.to_string(),
            _ => self.generated_path.clone(),
        }
    }

    /// Stable identity for feeds: generated directory plus slug, unescaped.
    pub fn id(&self) -> String {
        permalink::url_join(permalink::url_dirname(&self.generated_path), &self.slug)
    }

    pub fn title(&self) -> String {
        self.data
            .get_str("title")
            .unwrap_or_else(|| naming::title_from_slug(&self.slug))
    }

    pub fn layout(&self) -> Option<String> {
        self.data.get_str("layout")
    }

    /// Where the rendered output is written under `dest`.
    pub fn destination(&self, dest: &Path) -> PathBuf {
        let relative = permalink::unescape(&self.generated_path);
        let path = dest.join(relative.trim_start_matches('/'));
        if self.index_file {
            path.join("index.html")
        } else {
            path
        }
    }

    /// Converted content once rendered, the raw body before.
    pub fn content(&self) -> &str {
        self.rendered
            .get()
            .map(|r| r.content.as_str())
            .unwrap_or(&self.body)
    }

    pub fn output(&self) -> Option<&str> {
        self.rendered.get().map(|r| r.output.as_str())
    }

    /// Record the result of rendering. Allowed once.
    pub fn set_rendered(&self, rendered: Rendered) -> Result<(), EntityError> {
        self.rendered
            .set(rendered)
            .map_err(|_| EntityError::AlreadyRendered(self.name.clone()))
    }

    /// Template view without neighbours.
    pub fn summary(&self) -> Value {
        let mut view = self.data.as_map().clone();
        view.insert("title".into(), Value::String(self.title()));
        view.insert("url".into(), Value::String(self.url()));
        view.insert("date".into(), Value::String(date::to_payload(&self.date)));
        view.insert("id".into(), Value::String(self.id()));
        view.insert("categories".into(), string_list(&self.categories));
        view.insert("tags".into(), string_list(&self.tags));
        view.insert(
            "folded".into(),
            Value::Bool(self.content().contains(filters::FOLD_MARKER)),
        );
        view.insert("content".into(), Value::String(self.content().to_string()));
        Value::Object(view)
    }

    /// Full template view, as `page`.
    pub fn to_liquid(&self, neighbours: &Neighbours) -> Value {
        let mut view = self.summary();
        if let Value::Object(map) = &mut view {
            map.insert("next".into(), neighbours.next.clone().unwrap_or(Value::Null));
            map.insert(
                "previous".into(),
                neighbours.previous.clone().unwrap_or(Value::Null),
            );
        }
        view
    }

    /// Render against the site payload. Does not store the result.
    pub fn render(
        &self,
        renderer: &Renderer<'_>,
        site_payload: &Value,
        related: Vec<Value>,
        neighbours: &Neighbours,
    ) -> Result<Rendered, RenderError> {
        let mut site_local = Map::new();
        site_local.insert(
            self.kind.spec().related_key.to_string(),
            Value::Array(related),
        );
        let payload = payload::document_payload(site_payload, self.to_liquid(neighbours), site_local);
        let layout = self.layout();
        renderer.render(
            Document {
                name: &self.name,
                body: &self.body,
                ext: &self.ext,
                layout: layout.as_deref(),
            },
            payload,
        )
    }

    /// Write the rendered output to its destination under `dest`.
    pub fn write(&self, dest: &Path) -> Result<PathBuf, EntityError> {
        let output = self
            .output()
            .ok_or_else(|| EntityError::NotRendered(self.name.clone()))?;
        let path = self.destination(dest);
        write_output(&path, output.as_bytes()).map_err(|source| EntityError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Entity {}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

/// Adjacent entities in ascending order, as template summaries.
#[derive(Debug, Clone, Default)]
pub struct Neighbours {
    /// The next newer entity.
    pub next: Option<Value>,
    /// The next older entity.
    pub previous: Option<Value>,
}

impl Neighbours {
    /// Neighbours of `list[index]` in an ascending list.
    pub fn within(list: &[Entity], index: usize) -> Self {
        Self {
            next: list.get(index + 1).map(Entity::summary),
            previous: index
                .checked_sub(1)
                .and_then(|i| list.get(i))
                .map(Entity::summary),
        }
    }
}

fn string_list(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

/// Write `bytes` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}
