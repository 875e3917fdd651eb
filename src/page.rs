//! Free-floating pages and verbatim static files.
//!
//! Any file outside the collection directories that starts with front matter
//! is a [`Page`]: rendered like an entity but routed by its location in the
//! source tree instead of a date. Everything else is a [`StaticFile`],
//! copied byte-for-byte.

use crate::entity::{EntityError, write_output};
use crate::frontmatter;
use crate::frontmatter::FrontMatter;
use crate::payload;
use crate::permalink;
use crate::render::{Converters, Document, RenderError, Rendered, Renderer};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Settings every page is constructed with.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    /// Route HTML pages as `/<dir>/<name>/` instead of `/<dir>/<name>.html`.
    pub pretty: bool,
    pub converters: &'a Converters,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub source: PathBuf,
    /// Containing directory relative to the source root, `""` at the root.
    pub dir: String,
    /// File name, e.g. `about.md`.
    pub name: String,
    /// File name minus its last extension.
    pub basename: String,
    /// Source extension with the leading dot, or empty.
    pub ext: String,
    pub output_ext: String,
    pub data: FrontMatter,
    pub body: String,
    url: String,
    rendered: OnceLock<Rendered>,
}

impl Page {
    pub fn read(
        source_root: &Path,
        dir: &str,
        name: &str,
        ctx: &PageContext<'_>,
    ) -> Result<Self, EntityError> {
        let path = source_root.join(dir).join(name);
        let raw = fs::read_to_string(&path).map_err(|source| EntityError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_source(dir, name, &raw, path, ctx)
    }

    pub fn from_source(
        dir: &str,
        name: &str,
        raw: &str,
        source: PathBuf,
        ctx: &PageContext<'_>,
    ) -> Result<Self, EntityError> {
        let (data, body) = frontmatter::split(raw).map_err(|e| EntityError::FrontMatter {
            path: source.clone(),
            source: e,
        })?;
        let (basename, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
            _ => (name.to_string(), String::new()),
        };
        let output_ext = ctx.converters.output_ext(&ext);
        let dir = dir.replace('\\', "/").trim_matches('/').to_string();
        let url = match data.get_str("permalink") {
            Some(explicit) => explicit,
            None => {
                let file = if ctx.pretty && output_ext == ".html" && basename != "index" {
                    format!("{basename}/")
                } else {
                    format!("{basename}{output_ext}")
                };
                permalink::collapse_slashes(&permalink::url_join(&format!("/{dir}"), &file))
            }
        };

        Ok(Self {
            source,
            dir,
            name: name.to_string(),
            basename,
            ext,
            output_ext,
            data,
            body,
            url,
            rendered: OnceLock::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_html(&self) -> bool {
        self.output_ext == ".html"
    }

    /// Source path relative to the site root, for messages.
    pub fn relative_path(&self) -> String {
        if self.dir.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.dir, self.name)
        }
    }

    pub fn destination(&self, dest: &Path) -> PathBuf {
        let relative = permalink::unescape(&self.url);
        let path = dest.join(relative.trim_start_matches('/'));
        if self.url.ends_with('/') {
            path.join("index.html")
        } else {
            path
        }
    }

    pub fn content(&self) -> &str {
        self.rendered
            .get()
            .map(|r| r.content.as_str())
            .unwrap_or(&self.body)
    }

    pub fn output(&self) -> Option<&str> {
        self.rendered.get().map(|r| r.output.as_str())
    }

    pub fn set_rendered(&self, rendered: Rendered) -> Result<(), EntityError> {
        self.rendered
            .set(rendered)
            .map_err(|_| EntityError::AlreadyRendered(self.relative_path()))
    }

    pub fn to_liquid(&self) -> Value {
        let mut view = self.data.as_map().clone();
        view.insert("url".into(), Value::String(self.url.clone()));
        view.insert("content".into(), Value::String(self.content().to_string()));
        Value::Object(view)
    }

    pub fn render(
        &self,
        renderer: &Renderer<'_>,
        site_payload: &Value,
    ) -> Result<Rendered, RenderError> {
        let payload = payload::document_payload(site_payload, self.to_liquid(), Map::new());
        let name = self.relative_path();
        let layout = self.data.get_str("layout");
        renderer.render(
            Document {
                name: &name,
                body: &self.body,
                ext: &self.ext,
                layout: layout.as_deref(),
            },
            payload,
        )
    }

    pub fn write(&self, dest: &Path) -> Result<PathBuf, EntityError> {
        let output = self
            .output()
            .ok_or_else(|| EntityError::NotRendered(self.relative_path()))?;
        let path = self.destination(dest);
        write_output(&path, output.as_bytes()).map_err(|source| EntityError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// A file copied verbatim to the mirrored output path.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFile {
    pub source: PathBuf,
    /// Path relative to the source root.
    pub relative: PathBuf,
}

impl StaticFile {
    pub fn new(source_root: &Path, relative: PathBuf) -> Self {
        Self {
            source: source_root.join(&relative),
            relative,
        }
    }

    pub fn destination(&self, dest: &Path) -> PathBuf {
        dest.join(&self.relative)
    }

    pub fn write(&self, dest: &Path) -> Result<PathBuf, EntityError> {
        let path = self.destination(dest);
        let copy = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&self.source, &path)?;
            Ok(())
        };
        copy().map_err(|source| EntityError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
