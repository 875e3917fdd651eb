//! CLI output formatting for `check` and `build`.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. The primary display
//! for every document is its identity (positional index and title) with
//! filesystem paths shown as secondary context on indented lines.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Posts
//! 001 First Post
//!     Source: _posts/2008-11-05-first-post.md
//!     URL: /2008/11/05/first-post.html
//!     Tags: intro, rust
//!
//! Photos
//! 001 Sunset
//!     Source: _photos/2009-01-02-sunset.md
//!     URL: /2009/01/02/sunset.html
//!
//! Pages
//! 001 about.md → /about.html
//!
//! Static files
//!     .htaccess
//!     css/style.css
//!
//! Layouts
//!     archive_yearly, default, post
//! ```
//!
//! ## Build
//!
//! ```text
//! Posts
//! 001 First Post → 2008/11/05/first-post.html
//!
//! Pages
//! 001 about.md → about.html
//!
//! Cleanup
//!     Removed: 2008/11/05/stray.html
//!
//! Built 3 posts, 1 photo, 2 pages, 2 static files, 2 archives
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::entity::Entity;
use crate::site::{BuildReport, Site};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 post`, `3 posts`.
fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

/// `path` relative to `root`, `/`-separated. Falls back to the full path.
fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn entity_lines(lines: &mut Vec<String>, heading: &str, entities: &[Entity], source: &Path) {
    if entities.is_empty() {
        return;
    }
    lines.push(heading.to_string());
    for (i, entity) in entities.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), entity.title()));
        lines.push(format!(
            "{}Source: {}",
            indent(1),
            display_relative(&entity.source, source)
        ));
        lines.push(format!("{}URL: {}", indent(1), entity.url()));
        if !entity.categories.is_empty() {
            lines.push(format!(
                "{}Categories: {}",
                indent(1),
                entity.categories.join(", ")
            ));
        }
        if !entity.tags.is_empty() {
            lines.push(format!("{}Tags: {}", indent(1), entity.tags.join(", ")));
        }
    }
    lines.push(String::new());
}

// ============================================================================
// check
// ============================================================================

/// Format the inventory found by the Read phase.
pub fn format_check_output(site: &Site) -> Vec<String> {
    let content = site.content();
    let source = site.source();
    let mut lines = Vec::new();

    entity_lines(&mut lines, "Posts", &content.posts, source);
    entity_lines(&mut lines, "Photos", &content.photos, source);

    if !content.pages.is_empty() {
        lines.push("Pages".to_string());
        for (i, page) in content.pages.iter().enumerate() {
            lines.push(format!(
                "{} {} → {}",
                format_index(i + 1),
                page.relative_path(),
                page.url()
            ));
        }
        lines.push(String::new());
    }

    if !content.static_files.is_empty() {
        lines.push("Static files".to_string());
        for file in &content.static_files {
            lines.push(format!(
                "{}{}",
                indent(1),
                file.relative.to_string_lossy().replace('\\', "/")
            ));
        }
        lines.push(String::new());
    }

    lines.push("Layouts".to_string());
    if content.layouts.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    } else {
        let names: Vec<&str> = content.layouts.keys().map(String::as_str).collect();
        lines.push(format!("{}{}", indent(1), names.join(", ")));
    }
    lines
}

pub fn print_check_output(site: &Site) {
    for line in format_check_output(site) {
        println!("{}", line);
    }
}

// ============================================================================
// build
// ============================================================================

/// Format the outcome of a full build.
pub fn format_build_output(site: &Site) -> Vec<String> {
    let content = site.content();
    let dest = site.destination();
    let mut lines = Vec::new();

    for (heading, entities) in [("Posts", &content.posts), ("Photos", &content.photos)] {
        if entities.is_empty() {
            continue;
        }
        lines.push(heading.to_string());
        for (i, entity) in entities.iter().enumerate() {
            lines.push(format!(
                "{} {} → {}",
                format_index(i + 1),
                entity.title(),
                display_relative(&entity.destination(dest), dest)
            ));
        }
        lines.push(String::new());
    }

    if !content.pages.is_empty() {
        lines.push("Pages".to_string());
        for (i, page) in content.pages.iter().enumerate() {
            lines.push(format!(
                "{} {} → {}",
                format_index(i + 1),
                page.relative_path(),
                display_relative(&page.destination(dest), dest)
            ));
        }
        lines.push(String::new());
    }

    let report = site.report();
    lines.extend(format_cleanup(report, dest));
    lines.push(format_summary(report));
    lines
}

fn format_cleanup(report: &BuildReport, dest: &Path) -> Vec<String> {
    let cleanup = &report.cleanup;
    if cleanup.is_clean() {
        return Vec::new();
    }
    let mut lines = vec!["Cleanup".to_string()];
    for path in &cleanup.removed {
        lines.push(format!(
            "{}Removed: {}",
            indent(1),
            display_relative(path, dest)
        ));
    }
    for (path, reason) in &cleanup.failures {
        lines.push(format!(
            "{}Failed: {} ({})",
            indent(1),
            display_relative(path, dest),
            reason
        ));
    }
    lines.push(String::new());
    lines
}

/// One-line totals.
pub fn format_summary(report: &BuildReport) -> String {
    format!(
        "Built {}, {}, {}, {}, {}",
        count(report.posts, "post", "posts"),
        count(report.photos, "photo", "photos"),
        count(report.pages, "page", "pages"),
        count(report.static_files, "static file", "static files"),
        count(report.archives, "archive", "archives"),
    )
}

pub fn print_build_output(site: &Site) {
    for line in format_build_output(site) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::CleanupReport;
    use crate::test_helpers::*;
    use std::path::PathBuf;

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn count_pluralizes() {
        assert_eq!(count(1, "post", "posts"), "1 post");
        assert_eq!(count(0, "post", "posts"), "0 posts");
        assert_eq!(count(2, "static file", "static files"), "2 static files");
    }

    #[test]
    fn summary_line() {
        let report = BuildReport {
            posts: 3,
            photos: 1,
            pages: 2,
            static_files: 2,
            archives: 2,
            ..BuildReport::default()
        };
        assert_eq!(
            format_summary(&report),
            "Built 3 posts, 1 photo, 2 pages, 2 static files, 2 archives"
        );
    }

    #[test]
    fn cleanup_section_lists_removals_and_failures() {
        let dest = PathBuf::from("/out");
        let report = BuildReport {
            cleanup: CleanupReport {
                removed: vec![dest.join("old.html")],
                failures: vec![(dest.join("locked"), "permission denied".into())],
            },
            ..BuildReport::default()
        };
        assert_eq!(
            format_cleanup(&report, &dest),
            vec![
                "Cleanup",
                "    Removed: old.html",
                "    Failed: locked (permission denied)",
                "",
            ]
        );
        assert!(format_cleanup(&BuildReport::default(), &dest).is_empty());
    }

    #[test]
    fn check_output_lists_inventory() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.reset().unwrap();
        site.read().unwrap();
        let lines = format_check_output(&site);

        assert_eq!(lines[0], "Posts");
        assert_eq!(lines[1], "001 First Post");
        assert_eq!(lines[2], "    Source: _posts/2008-11-05-first-post.md");
        assert_eq!(lines[3], "    URL: /2008/11/05/first-post.html");
        assert_eq!(lines[4], "    Tags: intro, rust");
        assert!(lines.contains(&"    Categories: rust".to_string()));
        assert!(lines.contains(&"001 Sunset".to_string()));
        assert!(lines.contains(&"001 about.md → /about.html".to_string()));
        assert!(lines.contains(&"    css/style.css".to_string()));
        assert_eq!(lines.last().unwrap(), "    archive_yearly, default, post");
    }

    #[test]
    fn build_output_maps_documents_to_files() {
        let tmp = setup_fixtures();
        let mut site = fixture_site(tmp.path(), toml::Table::new());
        site.process().unwrap();
        let lines = format_build_output(&site);

        assert!(lines.contains(&"001 First Post → 2008/11/05/first-post.html".to_string()));
        assert!(lines.contains(&"002 Second Post → rust/2008/11/06/second-post.html".to_string()));
        assert!(lines.contains(&"002 index.html → index.html".to_string()));
        assert_eq!(
            lines.last().unwrap(),
            "Built 3 posts, 1 photo, 2 pages, 2 static files, 2 archives"
        );
    }
}
