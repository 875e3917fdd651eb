//! Source tree scanning and classification.
//!
//! The read phase walks the source directory and sorts every entry into one
//! of four buckets:
//!
//! ```text
//! site/
//! ├── _config.toml                 # never scanned (starts with `_`)
//! ├── _layouts/                    # layouts, loaded separately and flat
//! ├── _posts/                      # collection: dated posts
//! │   ├── 2008-11-05-first.md      #   categories: []
//! │   └── rust/2008-11-06-two.md   #   categories: ["rust"]
//! ├── _photos/                     # collection: dated photos
//! ├── blog/
//! │   └── _posts/                  # collection again, categories: ["blog"]
//! ├── about.md                     # page (starts with `---`)
//! ├── css/style.css                # static file (copied verbatim)
//! ├── .htaccess                    # static file (allow-listed dotfile)
//! └── notes.txt~                   # excluded (backup file)
//! ```
//!
//! ## Exclusion
//!
//! An entry is skipped when its name starts with `.`, `_` or `#`, ends with
//! `~`, or is listed in `exclude`. Names listed in `include` are never
//! skipped. The rule is applied to every path component, at every level.
//! Symbolic links are skipped entirely, and so is the destination directory
//! when it lives inside the source tree.

use crate::config::SiteConfig;
use crate::entity::{Entity, EntityContext, EntityError, EntityKind};
use crate::frontmatter;
use crate::page::{Page, PageContext, StaticFile};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error(transparent)]
    Entity(#[from] EntityError),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ScanError + '_ {
    move |source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Name-based exclusion rule shared by every reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    exclude: Vec<String>,
    include: Vec<String>,
}

impl EntryFilter {
    pub fn new(exclude: Vec<String>, include: Vec<String>) -> Self {
        Self { exclude, include }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(config.exclude.clone(), config.include.clone())
    }

    /// Whether a single entry name is skipped.
    pub fn is_excluded(&self, name: &str) -> bool {
        if self.include.iter().any(|i| i == name) {
            return false;
        }
        name.starts_with(['.', '_', '#'])
            || name.ends_with('~')
            || self.exclude.iter().any(|e| e == name)
    }
}

/// Result of probing a directory that may legitimately be missing.
#[derive(Debug)]
pub enum DirState {
    Present,
    Absent,
    Error(io::Error),
}

/// Probe `path` without following a missing directory into an error.
///
/// A path that exists but is not a directory counts as absent.
pub fn probe_dir(path: &Path) -> DirState {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => DirState::Present,
        Ok(_) => DirState::Absent,
        Err(e) if e.kind() == io::ErrorKind::NotFound => DirState::Absent,
        Err(e) => DirState::Error(e),
    }
}

/// Everything found in the source tree.
///
/// Entities are returned unfiltered; publication and date filters belong to
/// the read phase.
#[derive(Debug, Default)]
pub struct Inventory {
    pub entities: Vec<Entity>,
    pub pages: Vec<Page>,
    pub static_files: Vec<StaticFile>,
}

/// Options for a scan.
pub struct ScanOptions<'a> {
    pub source: &'a Path,
    /// Skipped when it lies inside the source tree.
    pub destination: &'a Path,
    pub filter: &'a EntryFilter,
    pub entity: EntityContext<'a>,
    pub page: PageContext<'a>,
}

/// Scan the whole source tree.
pub fn scan(options: &ScanOptions<'_>) -> Result<Inventory, ScanError> {
    let mut inventory = Inventory::default();
    let destination = fs::canonicalize(options.destination).ok();
    scan_directory(options, destination.as_deref(), Path::new(""), &mut inventory)?;
    Ok(inventory)
}

fn scan_directory(
    options: &ScanOptions<'_>,
    destination: Option<&Path>,
    relative: &Path,
    inventory: &mut Inventory,
) -> Result<(), ScanError> {
    let base = options.source.join(relative);

    for kind in EntityKind::ALL {
        read_collection(options, kind, relative, inventory)?;
    }

    let mut entries: Vec<fs::DirEntry> = fs::read_dir(&base)
        .map_err(io_error(&base))?
        .collect::<Result<_, _>>()
        .map_err(io_error(&base))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if options.filter.is_excluded(&name) {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type().map_err(io_error(&path))?;
        let child = relative.join(&name);

        if file_type.is_symlink() {
            debug!(path = %child.display(), "skipping symlink");
        } else if file_type.is_dir() {
            if is_destination(&path, destination) {
                debug!(path = %child.display(), "skipping destination directory");
                continue;
            }
            scan_directory(options, destination, &child, inventory)?;
        } else if frontmatter::has_front_matter(&path).map_err(io_error(&path))? {
            debug!(path = %child.display(), "page");
            let dir = relative.to_string_lossy();
            inventory
                .pages
                .push(Page::read(options.source, &dir, &name, &options.page)?);
        } else {
            debug!(path = %child.display(), "static file");
            inventory
                .static_files
                .push(StaticFile::new(options.source, child));
        }
    }
    Ok(())
}

fn is_destination(path: &Path, destination: Option<&Path>) -> bool {
    match (destination, fs::canonicalize(path)) {
        (Some(dest), Ok(path)) => path == dest,
        _ => false,
    }
}

/// Read `<relative>/_posts` (or `_photos`) recursively, if present.
fn read_collection(
    options: &ScanOptions<'_>,
    kind: EntityKind,
    relative: &Path,
    inventory: &mut Inventory,
) -> Result<(), ScanError> {
    let dir = options.source.join(relative).join(kind.spec().dir);
    match probe_dir(&dir) {
        DirState::Present => {}
        DirState::Absent => return Ok(()),
        DirState::Error(source) => return Err(ScanError::Io { path: dir, source }),
    }

    let categories: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    let walker = WalkDir::new(&dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !options.filter.is_excluded(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Walk {
            path: dir.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .strip_prefix(&dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        match Entity::read(kind, &dir, &categories, &name, &options.entity)? {
            Some(entity) => {
                debug!(kind = ?kind, name = %name, "entity");
                inventory.entities.push(entity);
            }
            None => debug!(kind = ?kind, name = %name, "not a dated entry, skipping"),
        }
    }
    Ok(())
}
