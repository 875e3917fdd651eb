//! Shared test utilities for the almanac test suite.
//!
//! Provides fixture setup, entity construction, and lookup helpers that
//! work with read-phase data structures (`Entity`, `Page`, `StaticFile`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let mut site = fixture_site(tmp.path(), toml::Table::new());
//! site.process().unwrap();
//!
//! let post = find_entity(&site.content().posts, "first-post");
//! assert_eq!(post.title(), "First Post");
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{PermalinkStyle, SiteConfig, load_config};
use crate::entity::{Entity, EntityContext, EntityKind};
use crate::page::{Page, StaticFile};
use crate::render::Converters;
use crate::site::Site;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// A site over `root`, configured from its `_config.toml` plus `overrides`.
pub fn fixture_site(root: &Path, overrides: toml::Table) -> Site {
    Site::new(load_config(root, overrides).unwrap())
}

/// Build an override table from key/value pairs.
pub fn overrides(pairs: &[(&str, toml::Value)]) -> toml::Table {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// =========================================================================
// Entity construction
// =========================================================================

/// A post named `name` with raw file content `raw`, using the `date`
/// permalink style and stock converters. Panics if `name` is not dated.
pub fn entity(name: &str, raw: &str) -> Entity {
    let config = SiteConfig::default();
    let converters = Converters::new(&config.markdown_ext);
    let ctx = EntityContext {
        permalink: &PermalinkStyle::Date,
        multiviews: false,
        converters: &converters,
    };
    Entity::from_source(
        EntityKind::Post,
        &[],
        name,
        raw,
        PathBuf::from("_posts").join(name),
        &ctx,
    )
    .unwrap()
    .unwrap_or_else(|| panic!("'{name}' is not a dated entity name"))
}

// =========================================================================
// Lookups: panic with the available names on a miss
// =========================================================================

/// Find an entity by slug. Panics if not found.
pub fn find_entity<'a>(entities: &'a [Entity], slug: &str) -> &'a Entity {
    entities.iter().find(|e| e.slug == slug).unwrap_or_else(|| {
        let slugs: Vec<&str> = entities.iter().map(|e| e.slug.as_str()).collect();
        panic!("entity '{slug}' not found. Available: {slugs:?}")
    })
}

/// Find a page by path relative to the source root. Panics if not found.
pub fn find_page<'a>(pages: &'a [Page], relative: &str) -> &'a Page {
    pages
        .iter()
        .find(|p| p.relative_path() == relative)
        .unwrap_or_else(|| {
            let paths = page_paths(pages);
            panic!("page '{relative}' not found. Available: {paths:?}")
        })
}

// =========================================================================
// Bulk extractors
// =========================================================================

/// Names of the entities of `kind`, in the given order.
pub fn entity_names(entities: &[Entity], kind: EntityKind) -> Vec<&str> {
    entities
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.name.as_str())
        .collect()
}

/// Page paths relative to the source root, in the given order.
pub fn page_paths(pages: &[Page]) -> Vec<String> {
    pages.iter().map(Page::relative_path).collect()
}

/// Static file paths relative to the source root, `/`-separated.
pub fn static_paths(files: &[StaticFile]) -> Vec<String> {
    files
        .iter()
        .map(|f| f.relative.to_string_lossy().replace('\\', "/"))
        .collect()
}
