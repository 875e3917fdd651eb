//! Markup converters.
//!
//! A converter claims source extensions and turns a body into output markup.
//! The registry tries converters in order and falls back to
//! [`IdentityConverter`], which passes content through and keeps the source
//! extension.

use pulldown_cmark::{Options, Parser, html as md_html};

/// Trait for markup converters.
pub trait Converter: Send + Sync {
    /// Whether this converter handles `ext` (with leading dot).
    fn matches(&self, ext: &str) -> bool;

    /// The extension of the converted output, e.g. `.html`.
    fn output_ext(&self, ext: &str) -> String;

    /// Convert a body.
    fn convert(&self, content: &str) -> String;
}

/// Markdown → HTML via pulldown-cmark.
#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    extensions: Vec<String>,
}

impl MarkdownConverter {
    /// `extensions` are given without the leading dot, as in config.
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Converter for MarkdownConverter {
    fn matches(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }

    fn output_ext(&self, _ext: &str) -> String {
        ".html".to_string()
    }

    fn convert(&self, content: &str) -> String {
        markdown_to_html(content)
    }
}

/// Render Markdown to HTML with tables, footnotes and strikethrough enabled.
pub fn markdown_to_html(content: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(content, options);
    let mut html = String::with_capacity(content.len() * 3 / 2);
    md_html::push_html(&mut html, parser);
    html
}

/// Pass-through for anything no other converter claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl Converter for IdentityConverter {
    fn matches(&self, _ext: &str) -> bool {
        true
    }

    fn output_ext(&self, ext: &str) -> String {
        ext.to_string()
    }

    fn convert(&self, content: &str) -> String {
        content.to_string()
    }
}

/// Ordered converter registry.
pub struct Converters {
    converters: Vec<Box<dyn Converter>>,
    fallback: IdentityConverter,
}

impl Converters {
    /// The stock registry: Markdown for the configured extensions.
    pub fn new(markdown_ext: &[String]) -> Self {
        Self {
            converters: vec![Box::new(MarkdownConverter::new(markdown_ext))],
            fallback: IdentityConverter,
        }
    }

    /// Register a converter ahead of the stock ones.
    pub fn push_front(&mut self, converter: Box<dyn Converter>) {
        self.converters.insert(0, converter);
    }

    /// The converter responsible for `ext`.
    pub fn for_ext(&self, ext: &str) -> &dyn Converter {
        self.converters
            .iter()
            .find(|c| c.matches(ext))
            .map(|c| c.as_ref())
            .unwrap_or(&self.fallback)
    }

    pub fn output_ext(&self, ext: &str) -> String {
        self.for_ext(ext).output_ext(ext)
    }

    pub fn convert(&self, ext: &str, content: &str) -> String {
        self.for_ext(ext).convert(content)
    }
}

impl std::fmt::Debug for Converters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converters")
            .field("count", &self.converters.len())
            .finish()
    }
}
