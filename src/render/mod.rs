//! Rendering seams: markup converters, the template engine, its filters,
//! and layouts.
//!
//! A document renders in three steps:
//!
//! 1. its body is rendered as a template against the payload,
//! 2. the result is converted by the converter for the document's extension,
//! 3. the converted content is wrapped in its layout chain.
//!
//! Step 2's output is kept as the document's `content`; step 3's output is
//! what gets written.

pub mod convert;
pub mod filters;
pub mod layout;
pub mod liquid_engine;
pub mod template;

pub use convert::{Converter, Converters, IdentityConverter, MarkdownConverter};
pub use layout::{Layout, Layouts, load_layouts};
pub use liquid_engine::LiquidEngine;
pub use template::{PlaceholderEngine, TemplateEngine, TemplateError};

use crate::config::TemplateLanguage;
use crate::frontmatter::FrontMatterError;
use crate::payload::Payload;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Front matter error in layout {path}: {source}")]
    LayoutFrontMatter {
        path: PathBuf,
        source: FrontMatterError,
    },
    #[error("Template error in {document}: {source}")]
    Template {
        document: String,
        source: TemplateError,
    },
    #[error("Layout `{layout}` used by {document} does not exist")]
    MissingLayout { layout: String, document: String },
    #[error("Layout cycle through `{0}`")]
    LayoutCycle(String),
}

/// The two products of rendering a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    /// Converted body, before layouts.
    pub content: String,
    /// Final output, after layouts.
    pub output: String,
}

/// Everything a document render needs besides its own data.
///
/// Holds shared references only, so a single `Renderer` is shared by every
/// worker during a parallel render.
#[derive(Clone, Copy)]
pub struct Renderer<'a> {
    pub engine: &'a dyn TemplateEngine,
    pub converters: &'a Converters,
    pub layouts: &'a Layouts,
}

/// One document handed to [`Renderer::render`].
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    /// Name used in error messages.
    pub name: &'a str,
    pub body: &'a str,
    /// Source extension, with the leading dot.
    pub ext: &'a str,
    /// Layout named in the document's front matter.
    pub layout: Option<&'a str>,
}

impl Renderer<'_> {
    pub fn render(&self, doc: Document<'_>, payload: Payload<'_>) -> Result<Rendered, RenderError> {
        let templated = self
            .engine
            .render(doc.body, &payload)
            .map_err(|source| RenderError::Template {
                document: doc.name.to_string(),
                source,
            })?;
        let content = self.converters.convert(doc.ext, &templated);
        let output = match doc.layout {
            Some(name) => layout::apply_chain(self.engine, self.layouts, doc.name, name, &content, payload)?,
            None => content.clone(),
        };
        Ok(Rendered { content, output })
    }
}

/// The stock engine for a configured template language.
pub fn engine_for(language: TemplateLanguage) -> Box<dyn TemplateEngine> {
    match language {
        TemplateLanguage::Placeholder => Box::new(PlaceholderEngine),
        TemplateLanguage::Liquid => Box::new(LiquidEngine::new()),
    }
}
