//! Site configuration module.
//!
//! Handles loading, validating, and merging `_config.toml`. Configuration is
//! layered: stock defaults are overridden by the site's `_config.toml`, which
//! is in turn overridden by command-line flags.
//!
//! ## Config File Location
//!
//! Place `_config.toml` in the source root. The leading underscore keeps the
//! scanner from copying it into the output tree:
//!
//! ```text
//! site/
//! ├── _config.toml             # Site config (overrides stock defaults)
//! ├── _layouts/
//! ├── _posts/
//! └── index.md
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! source = "."
//! destination = "_site"
//! permalink = "date"        # date | pretty | none | literal template
//! exclude = []              # names never scanned
//! include = [".htaccess"]   # dotfiles that are still copied
//! future = false            # publish posts dated after the build time
//! # limit_posts = 10        # keep only the N most recent posts
//! # time = "2024-01-01 00:00:00"
//! related_posts = false     # similarity-ranked related content
//! multiviews = false        # strip `.html` from entity URLs
//! markdown_ext = ["markdown", "mkd", "mkdn", "md"]
//! templates = "placeholder" # placeholder | liquid
//!
//! [processing]
//! parallel = false
//! # max_processes = 4
//!
//! [extra]
//! title = "My Blog"         # free-form, exposed as `site.title`
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file inside the source root.
pub const CONFIG_FILENAME: &str = "_config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `_config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Source tree to read content from.
    pub source: PathBuf,
    /// Output tree. Reconciled with the expected outputs on every build.
    pub destination: PathBuf,
    /// Permalink style (`date`, `pretty`, `none`) or a literal template.
    pub permalink: String,
    /// Entry names skipped at every directory level.
    pub exclude: Vec<String>,
    /// Dotfiles copied even though they start with `.`.
    pub include: Vec<String>,
    /// Publish entities dated after the build time.
    pub future: bool,
    /// Keep only the N most recent posts. Validated at reset.
    pub limit_posts: Option<i64>,
    /// Override for the build's notion of "now".
    pub time: Option<String>,
    /// Rank related content by similarity instead of list order.
    pub related_posts: bool,
    /// Strip a trailing `.html` from entity URLs.
    pub multiviews: bool,
    /// Extensions handled by the Markdown converter.
    pub markdown_ext: Vec<String>,
    /// Template language used by the stock engine.
    pub templates: TemplateLanguage,
    pub processing: ProcessingConfig,
    /// Free-form values merged into the `site` template payload.
    pub extra: toml::Table,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("."),
            destination: PathBuf::from("_site"),
            permalink: "date".to_string(),
            exclude: Vec::new(),
            include: vec![".htaccess".to_string()],
            future: false,
            limit_posts: None,
            time: None,
            related_posts: false,
            multiviews: false,
            markdown_ext: ["markdown", "mkd", "mkdn", "md"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            templates: TemplateLanguage::default(),
            processing: ProcessingConfig::default(),
            extra: toml::Table::new(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    ///
    /// `limit_posts` is deliberately not checked here: it is a build-time
    /// error raised when the site resets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.permalink.trim().is_empty() {
            return Err(ConfigError::Validation("permalink must not be empty".into()));
        }
        if self.markdown_ext.is_empty() {
            return Err(ConfigError::Validation(
                "markdown_ext must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// The resolved permalink style.
    pub fn permalink_style(&self) -> PermalinkStyle {
        PermalinkStyle::parse(&self.permalink)
    }
}

/// Which stock template engine renders documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateLanguage {
    /// `{{ }}` output tags only.
    #[default]
    Placeholder,
    /// Full Liquid: loops, conditionals, stock filters.
    Liquid,
}

/// Parallel rendering settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Fan rendering and writing out over a worker pool.
    pub parallel: bool,
    /// Maximum number of workers. When absent, defaults to the number of
    /// CPU cores. Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// How entity output paths are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermalinkStyle {
    /// `/:categories/:year/:month/:day/:title.html`
    Date,
    /// `/:categories/:year/:month/:day/:title/`
    Pretty,
    /// `/:categories/:title.html`
    None,
    /// Any other value is used as the template itself.
    Custom(String),
}

impl PermalinkStyle {
    pub fn parse(value: &str) -> Self {
        match value {
            "date" => Self::Date,
            "pretty" => Self::Pretty,
            "none" => Self::None,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The token template for this style.
    pub fn template(&self) -> &str {
        match self {
            Self::Pretty => "/:categories/:year/:month/:day/:title/",
            Self::None => "/:categories/:title.html",
            Self::Date => "/:categories/:year/:month/:day/:title.html",
            Self::Custom(template) => template,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `_config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no config file.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Apply each overlay in order onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config for the site rooted at `source`.
///
/// Merges the site's `_config.toml` on top of stock defaults, then the
/// caller's overrides (typically CLI flags) on top of that. The resolved
/// `source` always points at the directory the config was read from unless
/// the overrides say otherwise.
pub fn load_config(source: &Path, overrides: toml::Table) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let mut pinned = toml::Table::new();
    pinned.insert(
        "source".to_string(),
        toml::Value::String(source.to_string_lossy().into_owned()),
    );
    let file = load_raw_config(source)?;
    let layers = file
        .into_iter()
        .chain([toml::Value::Table(pinned), toml::Value::Table(overrides)]);
    resolve_config(base, layers)
}

/// Returns a fully-commented stock `_config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Almanac Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Output directory. Anything in it that the build does not produce is removed.
destination = "_site"

# Permalink style for posts and photos:
#   date   -> /:categories/:year/:month/:day/:title.html
#   pretty -> /:categories/:year/:month/:day/:title/
#   none   -> /:categories/:title.html
# Any other value is used as a template. Tokens: :categories :year :month
# :day :i_month :i_day :title :output_ext
permalink = "date"

# Entry names skipped at every directory level (in addition to names starting
# with ".", "_" or "#", and names ending with "~").
exclude = []

# Dotfiles that are copied anyway.
include = [".htaccess"]

# Publish posts dated after the build time.
future = false

# Keep only the N most recent posts (must be >= 1).
# limit_posts = 10

# Pin the build time instead of using the clock.
# time = "2024-01-01 00:00:00"

# Rank `site.related_posts` by content similarity. Slow on large sites.
related_posts = false

# Strip the trailing ".html" from post and photo URLs.
multiviews = false

# Extensions converted from Markdown to HTML.
markdown_ext = ["markdown", "mkd", "mkdn", "md"]

# Template language for layouts and documents:
#   placeholder -> {{ path | filter }} output tags only
#   liquid      -> full Liquid ({% for %}, {% if %}, stock filters)
templates = "placeholder"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Render and write pages on a worker pool.
parallel = false
# Omit to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Extra values, available to templates as site.<key>
# ---------------------------------------------------------------------------
[extra]
# title = "My Blog"
"##
}
