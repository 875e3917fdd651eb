//! The build orchestrator.
//!
//! A build runs seven phases in a fixed order, each at most once per
//! [`Site::process`] call:
//!
//! ```text
//! Reset → Read → Generate → Render → Cleanup → Write → WriteArchives → Done
//! ```
//!
//! | Phase | Work |
//! |---|---|
//! | Reset | resolve the build time, clear derived state, validate `limit_posts` |
//! | Read | load layouts, scan the source tree, filter and sort entities |
//! | Generate | run registered [`Generator`]s |
//! | Render | build the archive tree and indices, render every document |
//! | Cleanup | remove destination entries no document will produce |
//! | Write | write every document and static file |
//! | WriteArchives | render and write year/month/day archive pages |
//!
//! Phases can also be driven one by one; running one out of order is an
//! error. [`Site::reset`] is always allowed and starts over, so a single
//! `Site` can build repeatedly. The related-content index survives resets.
//!
//! With `[processing] parallel = true`, Render and Write fan out over the
//! rayon pool. Rendering collects every result before storing any of them,
//! so documents are never mutated while a render is in flight.

use crate::archive;
use crate::cleanup::{self, CleanupReport};
use crate::config::{PermalinkStyle, SiteConfig};
use crate::date;
use crate::entity::{Entity, EntityContext, EntityError, EntityKind, Neighbours};
use crate::generator::{self, Generator, GeneratorError};
use crate::index::{ArchiveTree, Collections, Taxonomy, TaxonomyIndex};
use crate::page::{Page, PageContext, StaticFile};
use crate::payload::{self, SitePayload};
use crate::related::{self, RelatedCache, SimilarityIndex};
use crate::render::{
    Converter, Converters, Layouts, RenderError, Rendered, Renderer, TemplateEngine, engine_for,
    load_layouts,
};
use crate::scan::{self, EntryFilter, ScanError, ScanOptions};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the layouts directory inside the source root.
pub const LAYOUTS_DIR: &str = "_layouts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Reset,
    Read,
    Generate,
    Render,
    Cleanup,
    Write,
    WriteArchives,
    Done,
}

impl Phase {
    /// The phase that must have completed before this one.
    fn predecessor(self) -> Option<Phase> {
        match self {
            Phase::Reset => None,
            Phase::Read => Some(Phase::Reset),
            Phase::Generate => Some(Phase::Read),
            Phase::Render => Some(Phase::Generate),
            Phase::Cleanup => Some(Phase::Render),
            Phase::Write => Some(Phase::Cleanup),
            Phase::WriteArchives => Some(Phase::Write),
            Phase::Done => Some(Phase::WriteArchives),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Reset => "reset",
            Phase::Read => "read",
            Phase::Generate => "generate",
            Phase::Render => "render",
            Phase::Cleanup => "cleanup",
            Phase::Write => "write",
            Phase::WriteArchives => "write-archives",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("limit_posts must be at least 1, got {0}")]
    InvalidLimitPosts(i64),
    #[error("Invalid build time `{0}`")]
    InvalidTime(String),
    #[error(
        "Destination {} contains the source tree {}",
        .destination.display(),
        .root.display()
    )]
    DestinationContainsSource { destination: PathBuf, root: PathBuf },
    #[error("Cannot run {attempted}: {expected} has not just completed")]
    PhaseOrder { attempted: Phase, expected: Phase },
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

/// Everything read from the source tree, plus the indices derived from it.
#[derive(Debug)]
pub struct SiteContent {
    /// The build's notion of "now".
    pub time: NaiveDateTime,
    pub layouts: Layouts,
    /// Ascending by date, then slug.
    pub posts: Vec<Entity>,
    /// Ascending by date, then slug.
    pub photos: Vec<Entity>,
    pub pages: Vec<Page>,
    pub static_files: Vec<StaticFile>,
    pub categories: TaxonomyIndex,
    pub tags: TaxonomyIndex,
    pub archive: ArchiveTree,
}

impl Default for SiteContent {
    fn default() -> Self {
        Self {
            time: NaiveDateTime::default(),
            layouts: Layouts::new(),
            posts: Vec::new(),
            photos: Vec::new(),
            pages: Vec::new(),
            static_files: Vec::new(),
            categories: TaxonomyIndex::new(Taxonomy::Categories),
            tags: TaxonomyIndex::new(Taxonomy::Tags),
            archive: ArchiveTree::default(),
        }
    }
}

impl SiteContent {
    pub fn collections(&self) -> Collections<'_> {
        Collections {
            posts: &self.posts,
            photos: &self.photos,
        }
    }

    pub fn entities(&self, kind: EntityKind) -> &[Entity] {
        self.collections().of(kind)
    }
}

/// Counts collected over one build.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub posts: usize,
    pub photos: usize,
    pub pages: usize,
    pub static_files: usize,
    pub layouts: usize,
    pub archives: usize,
    /// Files written by Write and WriteArchives.
    pub written: usize,
    pub cleanup: CleanupReport,
}

pub struct Site {
    config: SiteConfig,
    source: PathBuf,
    destination: PathBuf,
    filter: EntryFilter,
    permalink: PermalinkStyle,
    converters: Converters,
    engine: Box<dyn TemplateEngine>,
    generators: Vec<Box<dyn Generator>>,
    related: RelatedCache,
    content: SiteContent,
    completed: Option<Phase>,
    report: BuildReport,
}

impl Site {
    /// A site for `config`, rendering with the stock engine for
    /// `config.templates`.
    ///
    /// A relative `destination` is resolved against `source`.
    pub fn new(config: SiteConfig) -> Self {
        let source = config.source.clone();
        let destination = if config.destination.is_absolute() {
            config.destination.clone()
        } else {
            source.join(&config.destination)
        };
        Self {
            filter: EntryFilter::from_config(&config),
            permalink: config.permalink_style(),
            converters: Converters::new(&config.markdown_ext),
            engine: engine_for(config.templates),
            generators: Vec::new(),
            related: RelatedCache::new(),
            content: SiteContent::default(),
            completed: None,
            report: BuildReport::default(),
            config,
            source,
            destination,
        }
    }

    pub fn with_engine(mut self, engine: Box<dyn TemplateEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn add_generator(&mut self, generator: Box<dyn Generator>) {
        self.generators.push(generator);
    }

    /// Register a converter ahead of the stock ones.
    pub fn add_converter(&mut self, converter: Box<dyn Converter>) {
        self.converters.push_front(converter);
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn content(&self) -> &SiteContent {
        &self.content
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn related_cache(&self) -> &RelatedCache {
        &self.related
    }

    /// The last phase that completed.
    pub fn phase(&self) -> Option<Phase> {
        self.completed
    }

    /// Run every phase in order.
    pub fn process(&mut self) -> Result<&BuildReport, SiteError> {
        self.reset()?;
        self.read()?;
        self.generate()?;
        self.render()?;
        self.cleanup()?;
        self.write()?;
        self.write_archives()?;
        Ok(&self.report)
    }

    fn enter(&self, phase: Phase) -> Result<(), SiteError> {
        match phase.predecessor() {
            Some(expected) if self.completed != Some(expected) => {
                Err(SiteError::PhaseOrder {
                    attempted: phase,
                    expected,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn reset(&mut self) -> Result<(), SiteError> {
        self.completed = None;
        // Cleanup deletes whatever the build does not produce.
        if resolve_existing(&self.source).starts_with(resolve_existing(&self.destination)) {
            return Err(SiteError::DestinationContainsSource {
                destination: self.destination.clone(),
                root: self.source.clone(),
            });
        }
        let time = match &self.config.time {
            Some(raw) => {
                date::parse_timestamp(raw).ok_or_else(|| SiteError::InvalidTime(raw.clone()))?
            }
            None => chrono::Local::now().naive_local(),
        };
        self.content = SiteContent {
            time,
            ..SiteContent::default()
        };
        self.report = BuildReport::default();
        if let Some(limit) = self.config.limit_posts.filter(|&n| n < 1) {
            return Err(SiteError::InvalidLimitPosts(limit));
        }
        debug!(phase = %Phase::Reset, time = %date::to_payload(&time), "reset");
        self.completed = Some(Phase::Reset);
        Ok(())
    }

    pub fn read(&mut self) -> Result<(), SiteError> {
        self.enter(Phase::Read)?;

        let layouts = load_layouts(
            &self.source.join(LAYOUTS_DIR),
            &self.filter,
            &self.converters,
        )?;
        let inventory = scan::scan(&ScanOptions {
            source: &self.source,
            destination: &self.destination,
            filter: &self.filter,
            entity: EntityContext {
                permalink: &self.permalink,
                multiviews: self.config.multiviews,
                converters: &self.converters,
            },
            page: PageContext {
                pretty: self.permalink == PermalinkStyle::Pretty,
                converters: &self.converters,
            },
        })?;

        let time = self.content.time;
        let mut posts = Vec::new();
        let mut photos = Vec::new();
        for entity in inventory.entities {
            if !entity.published {
                debug!(name = %entity.name, "unpublished, skipping");
                continue;
            }
            if !self.config.future && entity.date > time {
                debug!(name = %entity.name, "dated in the future, skipping");
                continue;
            }
            match entity.kind {
                EntityKind::Post => posts.push(entity),
                EntityKind::Photo => photos.push(entity),
            }
        }
        posts.sort();
        photos.sort();
        if let Some(limit) = self.config.limit_posts.and_then(|n| usize::try_from(n).ok()) {
            let excess = posts.len().saturating_sub(limit);
            posts.drain(..excess);
        }

        self.content.layouts = layouts;
        self.content.posts = posts;
        self.content.photos = photos;
        self.content.pages = inventory.pages;
        self.content.static_files = inventory.static_files;
        self.index_taxonomies(false);

        let c = &self.content;
        self.report.posts = c.posts.len();
        self.report.photos = c.photos.len();
        self.report.pages = c.pages.len();
        self.report.static_files = c.static_files.len();
        self.report.layouts = c.layouts.len();
        info!(
            phase = %Phase::Read,
            posts = c.posts.len(),
            photos = c.photos.len(),
            pages = c.pages.len(),
            static_files = c.static_files.len(),
            layouts = c.layouts.len(),
            "read source tree"
        );
        self.completed = Some(Phase::Read);
        Ok(())
    }

    pub fn generate(&mut self) -> Result<(), SiteError> {
        self.enter(Phase::Generate)?;
        generator::run_all(&self.generators, &self.config, &mut self.content)?;
        info!(phase = %Phase::Generate, generators = self.generators.len(), "ran generators");
        self.completed = Some(Phase::Generate);
        Ok(())
    }

    pub fn render(&mut self) -> Result<(), SiteError> {
        self.enter(Phase::Render)?;

        self.content.archive = ArchiveTree::build(&self.content.posts);
        self.index_taxonomies(true);
        let site_payload = self.site_payload();

        let renderer = Renderer {
            engine: self.engine.as_ref(),
            converters: &self.converters,
            layouts: &self.content.layouts,
        };
        let parallel = self.config.processing.parallel;
        let related = self.config.related_posts.then_some(&self.related);

        for kind in EntityKind::ALL {
            let list = self.content.entities(kind);
            let rendered = render_entities(kind, list, &renderer, &site_payload, related, parallel)?;
            for (entity, result) in list.iter().zip(rendered) {
                entity.set_rendered(result)?;
            }
        }

        let pages = &self.content.pages;
        let rendered = try_map(parallel, pages.len(), |i| {
            pages[i].render(&renderer, &site_payload)
        })?;
        for (page, result) in pages.iter().zip(rendered) {
            page.set_rendered(result)?;
        }

        info!(
            phase = %Phase::Render,
            documents = self.content.posts.len() + self.content.photos.len() + pages.len(),
            parallel,
            "rendered documents"
        );
        self.completed = Some(Phase::Render);
        Ok(())
    }

    /// Destination paths of every document and static file of this build.
    pub fn expected_outputs(&self) -> Vec<PathBuf> {
        let dest = &self.destination;
        let c = &self.content;
        c.posts
            .iter()
            .chain(&c.photos)
            .map(|e| e.destination(dest))
            .chain(c.pages.iter().map(|p| p.destination(dest)))
            .chain(c.static_files.iter().map(|s| s.destination(dest)))
            .collect()
    }

    pub fn cleanup(&mut self) -> Result<(), SiteError> {
        self.enter(Phase::Cleanup)?;
        let expected = cleanup::expected_set(&self.destination, self.expected_outputs());
        let report = cleanup::cleanup(&self.destination, &expected);
        if !report.failures.is_empty() {
            warn!(
                failures = report.failures.len(),
                "some orphans could not be removed"
            );
        }
        info!(phase = %Phase::Cleanup, removed = report.removed.len(), "cleaned destination");
        self.report.cleanup = report;
        self.completed = Some(Phase::Cleanup);
        Ok(())
    }

    pub fn write(&mut self) -> Result<(), SiteError> {
        self.enter(Phase::Write)?;
        let c = &self.content;
        let outputs: Vec<Output<'_>> = c
            .posts
            .iter()
            .chain(&c.photos)
            .map(Output::Entity)
            .chain(c.pages.iter().map(Output::Page))
            .chain(c.static_files.iter().map(Output::Static))
            .collect();
        let dest = &self.destination;
        let written = try_map(self.config.processing.parallel, outputs.len(), |i| {
            outputs[i].write(dest)
        })?;
        for path in &written {
            debug!(path = %path.display(), "wrote");
        }
        info!(phase = %Phase::Write, written = written.len(), "wrote site");
        self.report.written += written.len();
        self.completed = Some(Phase::Write);
        Ok(())
    }

    pub fn write_archives(&mut self) -> Result<(), SiteError> {
        self.enter(Phase::WriteArchives)?;
        let pages = archive::archive_pages(&self.content.archive, &self.content.layouts);
        if !pages.is_empty() {
            let site_payload = self.site_payload();
            for page in &pages {
                let output = page.render(
                    self.engine.as_ref(),
                    &self.content.layouts,
                    &site_payload,
                    &self.content.posts,
                )?;
                let path = page.write(&self.destination, &output)?;
                debug!(path = %path.display(), "wrote archive");
            }
        }
        info!(phase = %Phase::WriteArchives, archives = pages.len(), "wrote archives");
        self.report.archives = pages.len();
        self.report.written += pages.len();
        self.completed = Some(Phase::Done);
        Ok(())
    }

    /// The `site` half of every template payload.
    pub fn site_payload(&self) -> Value {
        let c = &self.content;
        let collections = c.collections();
        SitePayload {
            config: payload::config_view(&self.config),
            time: date::to_payload(&c.time),
            posts: c.posts.iter().rev().map(Entity::summary).collect(),
            photos: c.photos.iter().rev().map(Entity::summary).collect(),
            collated_posts: c.archive.to_payload(&c.posts, Entity::summary),
            pages: c.pages.iter().map(Page::to_liquid).collect(),
            html_pages: c
                .pages
                .iter()
                .filter(|p| p.is_html())
                .map(Page::to_liquid)
                .collect(),
            categories: c.categories.to_payload(collections, Entity::summary),
            tags: c.tags.to_payload(collections, Entity::summary),
        }
        .into_value()
    }

    fn index_taxonomies(&mut self, sort: bool) {
        let collections = Collections {
            posts: &self.content.posts,
            photos: &self.content.photos,
        };
        let mut categories = TaxonomyIndex::build(Taxonomy::Categories, collections);
        let mut tags = TaxonomyIndex::build(Taxonomy::Tags, collections);
        if sort {
            categories.sort_descending(collections);
            tags.sort_descending(collections);
        }
        self.content.categories = categories;
        self.content.tags = tags;
    }
}

/// Canonical form of `path`. A path that does not exist yet is resolved
/// through its nearest existing ancestor.
fn resolve_existing(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(found) = fs::canonicalize(current) {
            return missing.iter().rev().fold(found, |acc, part| acc.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Something the Write phase puts on disk.
enum Output<'a> {
    Entity(&'a Entity),
    Page(&'a Page),
    Static(&'a StaticFile),
}

impl Output<'_> {
    fn write(&self, dest: &Path) -> Result<PathBuf, EntityError> {
        match self {
            Output::Entity(e) => e.write(dest),
            Output::Page(p) => p.write(dest),
            Output::Static(s) => s.write(dest),
        }
    }
}

/// Map `f` over `0..len`, on the rayon pool when `parallel` is set.
/// Results keep index order; the first error wins.
fn try_map<T, E, F>(parallel: bool, len: usize, f: F) -> Result<Vec<T>, E>
where
    T: Send,
    E: Send,
    F: Fn(usize) -> Result<T, E> + Sync + Send,
{
    if parallel {
        (0..len).into_par_iter().map(f).collect()
    } else {
        (0..len).map(f).collect()
    }
}

/// Render every entity of one kind. The related corpus is the kind's
/// collection as exposed in the payload, newest first.
fn render_entities(
    kind: EntityKind,
    list: &[Entity],
    renderer: &Renderer<'_>,
    site_payload: &Value,
    related: Option<&RelatedCache>,
    parallel: bool,
) -> Result<Vec<Rendered>, RenderError> {
    let empty = Vec::new();
    let corpus = site_payload["site"][kind.spec().collection]
        .as_array()
        .unwrap_or(&empty);

    try_map(parallel, list.len(), |i| {
        let entity = &list[i];
        let index = related.filter(|_| list.len() > 1).map(|cache| {
            cache.get_or_build(kind, || {
                info!(kind = ?kind, documents = list.len(), "building related-content index");
                SimilarityIndex::build(list.iter().rev().map(|e| e.body.as_str()))
            })
        });
        let position = list.len() - 1 - i;
        let related_items = related::related_indices(position, &entity.body, corpus.len(), index)
            .into_iter()
            .filter_map(|j| corpus.get(j).cloned())
            .collect();
        entity.render(
            renderer,
            site_payload,
            related_items,
            &Neighbours::within(list, i),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::tests::RecordingGenerator;
    use crate::payload::Payload;
    use crate::render::{PlaceholderEngine, TemplateError};
    use crate::test_helpers::*;
    use std::collections::BTreeSet;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn slugs(list: &[Entity]) -> Vec<&str> {
        list.iter().map(|e| e.slug.as_str()).collect()
    }

    #[test]
    fn process_runs_every_phase() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        assert_eq!(site.phase(), Some(Phase::Done));
        assert_eq!(site.report().posts, 3);
        assert_eq!(site.report().archives, 2);
    }

    #[test]
    fn phases_must_run_in_order() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        assert!(matches!(
            site.read(),
            Err(SiteError::PhaseOrder {
                attempted: Phase::Read,
                expected: Phase::Reset
            })
        ));
        site.reset().unwrap();
        site.read().unwrap();
        assert!(matches!(site.render(), Err(SiteError::PhaseOrder { .. })));
        assert!(matches!(site.read(), Err(SiteError::PhaseOrder { .. })));
    }

    #[test]
    fn read_filters_and_sorts() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.reset().unwrap();
        site.read().unwrap();
        let c = site.content();
        assert_eq!(slugs(&c.posts), vec!["first-post", "second-post", "nested"]);
        assert_eq!(slugs(&c.photos), vec!["sunset"]);
        assert!(c.layouts.contains_key("post"));
    }

    #[test]
    fn limit_posts_keeps_latest_ascending() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), overrides(&[("limit_posts", toml::Value::Integer(2))]));
        site.reset().unwrap();
        site.read().unwrap();
        assert_eq!(slugs(&site.content().posts), vec!["second-post", "nested"]);
        assert_eq!(slugs(&site.content().photos), vec!["sunset"]);

        let mut wide = fixture_site(tmp.path(), overrides(&[("limit_posts", toml::Value::Integer(50))]));
        wide.reset().unwrap();
        wide.read().unwrap();
        assert_eq!(wide.content().posts.len(), 3);
    }

    #[test]
    fn invalid_limit_posts_fails_reset() {
        let tmp = setup_fixtures();
        for bad in [0, -3] {
            let mut site =
                fixture_site(tmp.path(), overrides(&[("limit_posts", toml::Value::Integer(bad))]));
            assert!(matches!(site.reset(), Err(SiteError::InvalidLimitPosts(n)) if n == bad));
            assert!(matches!(site.read(), Err(SiteError::PhaseOrder { .. })));
        }
    }

    #[test]
    fn invalid_time_fails_reset() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(
            tmp.path(),
            overrides(&[("time", toml::Value::String("whenever".into()))]),
        );
        assert!(matches!(site.reset(), Err(SiteError::InvalidTime(_))));
    }

    #[test]
    fn future_posts_excluded_everywhere_unless_enabled() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        let c = site.content();
        assert!(!slugs(&c.posts).contains(&"future"));
        assert!(c.archive.years().all(|y| y != 2011));
        assert!(c.tags.get("later").is_none());
        assert!(c.categories.get("later").is_none());

        let mut future = fixture_site(tmp.path(), overrides(&[("future", toml::Value::Boolean(true))]));
        future.process().unwrap();
        let c = future.content();
        assert!(slugs(&c.posts).contains(&"future"));
        assert!(c.archive.get(2011, 1, 1).is_some());
        assert_eq!(c.tags.get("later").map(<[_]>::len), Some(1));
        assert_eq!(c.categories.get("later").map(<[_]>::len), Some(1));
    }

    #[test]
    fn archive_tree_from_fixture_posts() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        let tree = &site.content().archive;
        assert_eq!(tree.get(2008, 11, 5).map(<[_]>::len), Some(1));
        assert_eq!(tree.get(2008, 11, 6).map(<[_]>::len), Some(1));
    }

    #[test]
    fn tag_buckets_are_newest_first_in_payload() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        let payload = site.site_payload();
        let titles: Vec<&str> = payload["site"]["tags"]["rust"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Nested", "Second Post", "First Post"]);

        let posts: Vec<&str> = payload["site"]["posts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(posts, vec!["Nested", "Second Post", "First Post"]);
        assert_eq!(slugs(&site.content().posts), vec!["first-post", "second-post", "nested"]);
    }

    #[test]
    fn cleanup_removes_only_orphans_across_builds() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        let dest = site.destination().to_path_buf();

        let stray = dest.join("2008/11/05/stray.html");
        fs::write(&stray, "left over").unwrap();
        site.process().unwrap();
        let removed = &site.report().cleanup.removed;
        assert!(removed.contains(&stray));
        // Archive pages are not documents; they are swept and rewritten.
        assert!(removed.iter().all(|p| p == &stray || p.ends_with("index.html")));
        assert!(!stray.exists());
        assert!(dest.join("2008/11/05/first-post.html").exists());
        assert!(dest.join("2008/index.html").exists());
        assert!(dest.join(".htaccess").exists());
    }

    #[test]
    fn rendered_output_uses_layout_chain_and_neighbours() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        let second = &site.content().posts[1];
        let output = second.output().unwrap();
        assert!(output.contains("<title>Second Post | Fixture Journal</title>"));
        assert!(output.contains("Borrowing and ownership in Fixture Journal."));
        assert!(output.contains("href=\"/2008/11/05/first-post.html\">First Post</a>"));
        assert!(output.contains("href=\"/blog/2009/02/03/nested.html\">Nested</a>"));
    }

    #[test]
    fn pages_render_against_site_payload() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        let pages = &site.content().pages;

        let about = find_page(pages, "about.md").output().unwrap();
        assert!(about.contains("<title>About | Fixture Journal</title>"));
        assert!(about.contains("About <em>Fixture Journal</em>, written by A. Writer."));

        let index = find_page(pages, "index.html").output().unwrap();
        assert!(index.contains("<li>Posts: 3</li>"));
        assert!(index.contains("<li>Rust: 3</li>"));
        assert!(index.contains("href=\"/blog/2009/02/03/nested.html\">Nested</a>"));
    }

    #[test]
    fn related_lists_fall_back_to_newest_others() {
        let tmp = setup_fixtures();
        fs::write(
            tmp.path().join("_layouts/post.html"),
            "{% related %}{{ site.related_posts | size }}:{{ site.related_posts.first.title }}",
        )
        .unwrap();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        let first = site.content().posts[0].output().unwrap();
        assert_eq!(first, "{% related %}2:Nested");
        assert!(!site.related_cache().is_built(EntityKind::Post));
    }

    #[test]
    fn related_index_built_once_and_survives_reset() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(
            tmp.path(),
            overrides(&[("related_posts", toml::Value::Boolean(true))]),
        );
        site.process().unwrap();
        assert!(site.related_cache().is_built(EntityKind::Post));
        // A single photo has no relations, so no index is needed.
        assert!(!site.related_cache().is_built(EntityKind::Photo));
        site.reset().unwrap();
        assert!(site.related_cache().is_built(EntityKind::Post));
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let seq_tmp = setup_fixtures();
        let mut sequential = fixture_site(seq_tmp.path(), toml::Table::new());
        sequential.process().unwrap();

        let par_tmp = setup_fixtures();
        let mut processing = toml::Table::new();
        processing.insert("parallel".into(), toml::Value::Boolean(true));
        let mut parallel = fixture_site(
            par_tmp.path(),
            overrides(&[("processing", toml::Value::Table(processing))]),
        );
        parallel.process().unwrap();

        let outputs = |site: &Site| -> Vec<String> {
            site.content()
                .posts
                .iter()
                .map(|p| p.output().unwrap().to_string())
                .collect()
        };
        assert_eq!(outputs(&sequential), outputs(&parallel));
        assert_eq!(sequential.report().written, parallel.report().written);
    }

    #[test]
    fn generators_run_between_read_and_render() {
        let tmp = setup_fixtures();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.add_generator(Box::new(RecordingGenerator {
            name: "pages".into(),
            log: log.clone(),
            fail: false,
        }));
        site.process().unwrap();
        assert_eq!(log.lock().unwrap().clone(), vec![("pages".to_string(), 2)]);
    }

    #[test]
    fn missing_document_layout_is_fatal() {
        let tmp = setup_fixtures();
        fs::remove_file(tmp.path().join("_layouts/post.html")).unwrap();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        let err = site.process().unwrap_err();
        assert!(matches!(
            err,
            SiteError::Render(RenderError::MissingLayout { ref layout, .. }) if layout == "post"
        ));
    }

    #[test]
    fn missing_layouts_directory_skips_archives() {
        let tmp = setup_fixtures();
        fs::remove_dir_all(tmp.path().join("_layouts")).unwrap();
        for entry in ["_posts", "_photos", "blog", "about.md", "index.html"] {
            let path = tmp.path().join(entry);
            if path.is_dir() {
                fs::remove_dir_all(&path).unwrap();
            } else {
                fs::remove_file(&path).unwrap();
            }
        }
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        assert_eq!(site.report().archives, 0);
        assert!(site.destination().join("css/style.css").exists());
    }

    #[test]
    fn destination_containing_source_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("site");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("about.md"), "---\n---\nabout\n").unwrap();

        for destination in [".", "..", root.to_str().unwrap()] {
            let mut site = fixture_site(
                &root,
                overrides(&[("destination", toml::Value::String(destination.into()))]),
            );
            let err = site.process().unwrap_err();
            assert!(
                matches!(err, SiteError::DestinationContainsSource { .. }),
                "{destination}: {err}"
            );
            assert_eq!(site.phase(), None);
            assert!(root.join("about.md").is_file());
        }

        let mut site = fixture_site(
            &root,
            overrides(&[("destination", toml::Value::String("out/nested".into()))]),
        );
        site.process().unwrap();
        assert!(root.join("out/nested/about.html").is_file());
    }

    /// Records the address of the `site` value each render sees.
    struct SiteAddresses {
        seen: Arc<Mutex<BTreeSet<usize>>>,
    }

    impl TemplateEngine for SiteAddresses {
        fn render(&self, template: &str, payload: &Payload<'_>) -> Result<String, TemplateError> {
            if let Some(site) = payload.get("site") {
                self.seen
                    .lock()
                    .unwrap()
                    .insert(site as *const Value as usize);
            }
            PlaceholderEngine.render(template, payload)
        }
    }

    #[test]
    fn documents_share_one_site_payload() {
        let tmp = setup_fixtures();
        for day in 1..=40 {
            fs::write(
                tmp.path().join(format!("_posts/2009-03-{:02}-bulk-{day}.md", day % 28 + 1)),
                format!("---\nlayout: post\ntags: [bulk]\n---\nBulk post {day}.\n"),
            )
            .unwrap();
        }
        let seen = Arc::new(Mutex::new(BTreeSet::new()));
        let mut site = fixture_site(tmp.path(), toml::Table::new()).with_engine(Box::new(
            SiteAddresses { seen: seen.clone() },
        ));
        site.reset().unwrap();
        site.read().unwrap();
        site.generate().unwrap();
        site.render().unwrap();

        assert_eq!(site.content().posts.len(), 43);
        assert_eq!(seen.lock().unwrap().len(), 1);
        let index = find_page(&site.content().pages, "index.html").output().unwrap();
        assert!(index.contains("<li>Posts: 43</li>"));
    }

    #[test]
    fn stale_related_index_never_lists_the_post_itself() {
        let tmp = setup_fixtures();
        fs::write(
            tmp.path().join("_layouts/post.html"),
            "{{ page.title }}|{{ site.related_posts.0.title }}|{{ site.related_posts.1.title }}|{{ site.related_posts.2.title }}",
        )
        .unwrap();
        let mut site = fixture_site(
            tmp.path(),
            overrides(&[("related_posts", toml::Value::Boolean(true))]),
        );
        site.process().unwrap();

        fs::write(
            tmp.path().join("_posts/2009-06-01-added.md"),
            "---\nlayout: post\ntitle: Added\n---\nBorrowing and ownership again.\n",
        )
        .unwrap();
        site.process().unwrap();
        assert_eq!(site.content().posts.len(), 4);

        for post in &site.content().posts {
            let output = post.output().unwrap();
            let mut parts = output.split('|');
            let title = parts.next().unwrap();
            assert_eq!(title, post.title());
            for related in parts.filter(|t| !t.is_empty()) {
                assert_ne!(related, title, "{output}");
            }
        }
    }

    #[test]
    fn binary_photo_does_not_abort_build() {
        let tmp = setup_fixtures();
        fs::write(
            tmp.path().join("_photos/2009-01-03-shot.jpg"),
            [0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10],
        )
        .unwrap();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        assert_eq!(site.report().photos, 1);
    }

    #[test]
    fn liquid_layouts_can_loop_over_posts() {
        let tmp = setup_fixtures();
        fs::write(
            tmp.path().join("_layouts/post.html"),
            "---\nlayout: default\n---\n{{ content }}<ul>{% for tag in page.tags %}<li>{{ tag }}</li>{% endfor %}</ul>",
        )
        .unwrap();
        fs::write(
            tmp.path().join("_layouts/archive_yearly.html"),
            "{% for post in page.posts %}[{{ post.title }}]{% endfor %}",
        )
        .unwrap();
        let mut site = fixture_site(
            tmp.path(),
            overrides(&[("templates", toml::Value::String("liquid".into()))]),
        );
        site.process().unwrap();

        let first = find_entity(&site.content().posts, "first-post").output().unwrap();
        assert!(first.contains("<ul><li>intro</li><li>rust</li></ul>"));
        let archive = fs::read_to_string(site.destination().join("2008/index.html")).unwrap();
        assert_eq!(archive, "[Second Post][First Post]");
    }
}
