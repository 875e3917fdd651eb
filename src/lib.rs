//! # Almanac
//!
//! A static site generator for dated writing. A tree of front-matter
//! annotated files goes in; a destination tree of rendered pages, each at
//! its permalink, comes out, along with category and tag indices and
//! year/month/day archive pages.
//!
//! # Source Layout
//!
//! ```text
//! site/
//! ├── _config.toml                  # Site config (optional)
//! ├── _layouts/                     # Layouts, keyed by file stem
//! │   ├── default.html
//! │   ├── post.html                 # `layout: default` nests it in default
//! │   └── archive_yearly.html       # Enables YYYY/index.html archives
//! ├── _posts/                       # Posts: YYYY-MM-DD-slug.ext
//! │   ├── 2008-11-05-first-post.md
//! │   └── rust/2008-11-06-second.md # Category `rust`
//! ├── _photos/                      # Photos: same rules as posts
//! ├── blog/_posts/                  # Category `blog`
//! ├── about.md                      # Page (has front matter)
//! └── css/style.css                 # Static file (copied verbatim)
//! ```
//!
//! Names starting with `.`, `_` or `#`, or ending in `~`, are skipped unless
//! listed under `include`.
//!
//! # Build Pipeline
//!
//! [`site::Site::process`] runs seven phases in a fixed order:
//!
//! ```text
//! reset → read → generate → render → cleanup → write → write-archives
//! ```
//!
//! Cleanup removes everything in the destination that the current build
//! does not produce, so the output always mirrors the source.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`site`] | Build orchestrator: phases, content, payload, build report |
//! | [`scan`] | Source tree walk, entry filtering, classification |
//! | [`entity`] | Posts and photos: identity, permalink, render, write |
//! | [`page`] | Pages and static files |
//! | [`index`] | Category/tag indices and the date archive tree |
//! | [`archive`] | Synthesized year/month/day archive pages |
//! | [`related`] | Related-content ranking and its cache |
//! | [`cleanup`] | Orphan detection and removal in the destination |
//! | [`generator`] | Pluggable content generators |
//! | [`render`] | Template engine seam, converters, layouts, filters |
//! | [`payload`] | Template payload assembly |
//! | [`permalink`] | Permalink template expansion and URL helpers |
//! | [`frontmatter`] | YAML front matter splitting |
//! | [`naming`] | `YYYY-MM-DD-slug.ext` file name convention |
//! | [`date`] | Timestamp parsing and formatting |
//! | [`config`] | `_config.toml` loading, merging, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Read-Only Render
//!
//! Rendering never mutates documents in place. Every document is rendered
//! against one shared site payload, layered under its own keys by
//! [`payload::Payload`] rather than copied, and results are collected and
//! only then stored.
//! That keeps parallel rendering sound: indices and documents are immutable
//! for the whole fan-out.
//!
//! ## Indices Hold References, Not Copies
//!
//! Category, tag and archive indices store positions into the site's sorted
//! entity lists. A post appears once in memory however many tags it has.
//!
//! ## Templates Behind a Trait
//!
//! [`render::TemplateEngine`] is the only thing the pipeline knows about
//! templating. The built-in [`render::PlaceholderEngine`] handles
//! `{{ path | filter }}` substitution, [`render::LiquidEngine`] (selected
//! with `templates = "liquid"`) adds loops and conditionals, and other
//! engines plug in through [`site::Site::with_engine`].
//!
//! ## Destination Guard
//!
//! Cleanup removes everything the build does not produce, so a destination
//! that is the source tree or one of its ancestors is refused at reset.

pub mod archive;
pub mod cleanup;
pub mod config;
pub mod date;
pub mod entity;
pub mod frontmatter;
pub mod generator;
pub mod index;
pub mod naming;
pub mod output;
pub mod page;
pub mod payload;
pub mod permalink;
pub mod related;
pub mod render;
pub mod scan;
pub mod site;

#[cfg(test)]
pub(crate) mod test_helpers;
