//! Layouts: templates that wrap rendered content.
//!
//! Layouts live flat in `<source>/_layouts/` and are keyed by file name
//! minus its last extension (`post.html` → `post`, `feed.xml.html` →
//! `feed.xml`). A layout's own front matter may name a parent `layout`,
//! forming a chain that ends at the first layout without one.

use super::{Converters, RenderError, TemplateEngine};
use crate::frontmatter::{self, FrontMatter};
use crate::payload::{Payload, deep_merge};
use crate::scan::{DirState, EntryFilter, probe_dir};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub name: String,
    pub data: FrontMatter,
    /// Layout body, already converted by its extension.
    pub content: String,
}

impl Layout {
    /// The layout this one is wrapped in, if any.
    pub fn parent(&self) -> Option<String> {
        self.data.get_str("layout")
    }
}

pub type Layouts = BTreeMap<String, Layout>;

/// Load every layout file directly inside `dir`.
///
/// A missing directory yields no layouts.
pub fn load_layouts(
    dir: &Path,
    filter: &EntryFilter,
    converters: &Converters,
) -> Result<Layouts, RenderError> {
    match probe_dir(dir) {
        DirState::Present => {}
        DirState::Absent => return Ok(Layouts::new()),
        DirState::Error(e) => return Err(e.into()),
    }

    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains('.') && !filter.is_excluded(name))
        .collect();
    names.sort();

    let mut layouts = Layouts::new();
    for file_name in names {
        let Some((stem, ext)) = file_name.rsplit_once('.') else {
            continue;
        };
        let path = dir.join(&file_name);
        let raw = fs::read_to_string(&path)?;
        let (data, body) =
            frontmatter::split(&raw).map_err(|source| RenderError::LayoutFrontMatter {
                path: path.clone(),
                source,
            })?;
        let content = converters.convert(&format!(".{ext}"), &body);
        debug!(layout = stem, "loaded layout");
        layouts.insert(
            stem.to_string(),
            Layout {
                name: stem.to_string(),
                data,
                content,
            },
        );
    }
    Ok(layouts)
}

/// Wrap `content` in the layout `first` and each of its ancestors.
///
/// Each layout renders with `content` set to the output so far and its own
/// front matter merged beneath the document's `page` data. A missing `first`
/// is an error; a missing ancestor ends the chain with a warning.
pub fn apply_chain(
    engine: &dyn TemplateEngine,
    layouts: &Layouts,
    document: &str,
    first: &str,
    content: &str,
    mut payload: Payload<'_>,
) -> Result<String, RenderError> {
    let mut layout = layouts
        .get(first)
        .ok_or_else(|| RenderError::MissingLayout {
            layout: first.to_string(),
            document: document.to_string(),
        })?;
    let mut output = content.to_string();
    let mut seen: Vec<&str> = Vec::new();

    loop {
        if seen.contains(&layout.name.as_str()) {
            return Err(RenderError::LayoutCycle(layout.name.clone()));
        }
        seen.push(&layout.name);

        payload.insert("content", Value::String(output));
        let page = payload
            .take("page")
            .unwrap_or_else(|| Value::Object(Map::new()));
        payload.insert("page", deep_merge(layout.data.clone().into_value(), page));

        output = engine
            .render(&layout.content, &payload)
            .map_err(|source| RenderError::Template {
                document: format!("layout `{}` for {document}", layout.name),
                source,
            })?;

        let Some(parent) = layout.parent() else {
            break;
        };
        match layouts.get(&parent) {
            Some(next) => layout = next,
            None => {
                warn!(
                    layout = %layout.name,
                    parent = %parent,
                    document,
                    "parent layout not found, stopping layout chain"
                );
                break;
            }
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::render::PlaceholderEngine;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn load(dir: &Path) -> Layouts {
        let config = SiteConfig::default();
        load_layouts(
            dir,
            &EntryFilter::from_config(&config),
            &Converters::new(&config.markdown_ext),
        )
        .unwrap()
    }

    #[test]
    fn loads_flat_layouts_keyed_by_stem() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "default.html", "<html>{{ content }}</html>");
        write(tmp.path(), "post.html", "---\nlayout: default\n---\n<article>{{ content }}</article>");
        write(tmp.path(), "feed.xml.html", "x");
        write(tmp.path(), ".hidden.html", "x");
        write(tmp.path(), "noext", "x");
        fs::create_dir(tmp.path().join("nested.d")).unwrap();

        let layouts = load(tmp.path());
        assert_eq!(
            layouts.keys().collect::<Vec<_>>(),
            vec!["default", "feed.xml", "post"]
        );
        assert_eq!(layouts["post"].parent().as_deref(), Some("default"));
        assert_eq!(layouts["post"].content, "<article>{{ content }}</article>");
    }

    #[test]
    fn markdown_layouts_are_converted() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "note.md", "# {{ page.title }}");
        let layouts = load(tmp.path());
        assert_eq!(layouts["note"].content, "<h1>{{ page.title }}</h1>\n");
    }

    #[test]
    fn missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(load(&tmp.path().join("_layouts")).is_empty());
    }

    fn chain_fixture() -> Layouts {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "default.html", "<html>{{ page.title }}|{{ content }}</html>");
        write(
            tmp.path(),
            "post.html",
            "---\nlayout: default\ntitle: Layout Title\nkind: post\n---\n<article class=\"{{ page.kind }}\">{{ content }}</article>",
        );
        write(tmp.path(), "orphan.html", "---\nlayout: gone\n---\n<div>{{ content }}</div>");
        write(tmp.path(), "a.html", "---\nlayout: b\n---\nA{{ content }}");
        write(tmp.path(), "b.html", "---\nlayout: a\n---\nB{{ content }}");
        load(tmp.path())
    }

    #[test]
    fn chain_wraps_outward_and_page_wins() {
        let layouts = chain_fixture();
        let out = apply_chain(
            &PlaceholderEngine,
            &layouts,
            "doc",
            "post",
            "body",
            Payload::new(&json!({"page": {"title": "Doc Title"}})),
        )
        .unwrap();
        assert_eq!(out, "<html>Doc Title|<article class=\"post\">body</article></html>");
    }

    #[test]
    fn missing_first_layout_is_error() {
        let layouts = chain_fixture();
        let err = apply_chain(&PlaceholderEngine, &layouts, "doc", "nope", "x", Payload::new(&json!({}))).unwrap_err();
        assert!(matches!(err, RenderError::MissingLayout { ref layout, .. } if layout == "nope"));
    }

    #[test]
    fn missing_parent_stops_chain() {
        let layouts = chain_fixture();
        let out = apply_chain(&PlaceholderEngine, &layouts, "doc", "orphan", "x", Payload::new(&json!({}))).unwrap();
        assert_eq!(out, "<div>x</div>");
    }

    #[test]
    fn cycles_are_errors() {
        let layouts = chain_fixture();
        let err = apply_chain(&PlaceholderEngine, &layouts, "doc", "a", "x", Payload::new(&json!({}))).unwrap_err();
        assert!(matches!(err, RenderError::LayoutCycle(_)));
    }
}
