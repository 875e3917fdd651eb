//! Synthesized date archive pages.
//!
//! For every year, month and day in the [`ArchiveTree`] an index page is
//! rendered if the matching layout exists:
//!
//! | Level | Layout | Output |
//! |---|---|---|
//! | year | `archive_yearly` | `YYYY/index.html` |
//! | month | `archive_monthly` | `YYYY/MM/index.html` |
//! | day | `archive_daily` | `YYYY/MM/DD/index.html` |
//!
//! A missing layout silently skips that level.

use crate::date;
use crate::entity::{Entity, EntityError, write_output};
use crate::index::ArchiveTree;
use crate::payload;
use crate::render::{RenderError, TemplateEngine, layout::{self, Layouts}};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveLevel {
    Yearly,
    Monthly,
    Daily,
}

impl ArchiveLevel {
    pub fn layout(self) -> &'static str {
        match self {
            ArchiveLevel::Yearly => "archive_yearly",
            ArchiveLevel::Monthly => "archive_monthly",
            ArchiveLevel::Daily => "archive_daily",
        }
    }
}

/// One archive page.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivePage {
    pub level: ArchiveLevel,
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
    /// Indices into the ascending post list, newest first.
    pub posts: Vec<usize>,
}

impl ArchivePage {
    /// `2008`, `2008/11` or `2008/11/05`.
    pub fn dir(&self) -> String {
        match (self.month, self.day) {
            (Some(m), Some(d)) => format!("{:04}/{m:02}/{d:02}", self.year),
            (Some(m), None) => format!("{:04}/{m:02}", self.year),
            _ => format!("{:04}", self.year),
        }
    }

    pub fn url(&self) -> String {
        format!("/{}/", self.dir())
    }

    /// `2008`, `November 2008`, `05 November 2008`.
    pub fn title(&self) -> String {
        let month = self.month.and_then(date::month_name).unwrap_or_default();
        match (self.month, self.day) {
            (Some(_), Some(d)) => format!("{d:02} {month} {}", self.year),
            (Some(_), None) => format!("{month} {}", self.year),
            _ => self.year.to_string(),
        }
    }

    pub fn destination(&self, dest: &Path) -> PathBuf {
        dest.join(self.dir()).join("index.html")
    }

    pub fn to_liquid(&self, posts: &[Entity]) -> Value {
        let items: Vec<Value> = self
            .posts
            .iter()
            .filter_map(|i| posts.get(*i))
            .map(Entity::summary)
            .collect();
        json!({
            "title": self.title(),
            "url": self.url(),
            "year": self.year,
            "month": self.month,
            "day": self.day,
            "posts": items,
        })
    }

    /// Render through the level's layout chain. Archives have no body of
    /// their own, so the innermost `content` is empty.
    pub fn render(
        &self,
        engine: &dyn TemplateEngine,
        layouts: &Layouts,
        site_payload: &Value,
        posts: &[Entity],
    ) -> Result<String, RenderError> {
        let payload = payload::document_payload(site_payload, self.to_liquid(posts), Map::new());
        layout::apply_chain(
            engine,
            layouts,
            &format!("archive {}", self.dir()),
            self.level.layout(),
            "",
            payload,
        )
    }

    pub fn write(&self, dest: &Path, output: &str) -> Result<PathBuf, EntityError> {
        let path = self.destination(dest);
        write_output(&path, output.as_bytes()).map_err(|source| EntityError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Every archive page whose layout exists, newest year first, each year
/// followed by its months and each month by its days.
pub fn archive_pages(tree: &ArchiveTree, layouts: &Layouts) -> Vec<ArchivePage> {
    let has = |level: ArchiveLevel| layouts.contains_key(level.layout());
    let mut pages = Vec::new();
    for year in tree.years() {
        if has(ArchiveLevel::Yearly) {
            pages.push(ArchivePage {
                level: ArchiveLevel::Yearly,
                year,
                month: None,
                day: None,
                posts: tree.posts_in(year, None, None),
            });
        }
        for month in tree.months(year) {
            if has(ArchiveLevel::Monthly) {
                pages.push(ArchivePage {
                    level: ArchiveLevel::Monthly,
                    year,
                    month: Some(month),
                    day: None,
                    posts: tree.posts_in(year, Some(month), None),
                });
            }
            if !has(ArchiveLevel::Daily) {
                continue;
            }
            for day in tree.days(year, month) {
                pages.push(ArchivePage {
                    level: ArchiveLevel::Daily,
                    year,
                    month: Some(month),
                    day: Some(day),
                    posts: tree.posts_in(year, Some(month), Some(day)),
                });
            }
        }
    }
    pages
}
