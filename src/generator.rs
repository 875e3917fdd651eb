//! Pluggable content generators.
//!
//! Generators run during the Generate phase, after everything has been read
//! and before anything is rendered. They receive the site's content and may
//! add, remove or edit pages and entities. They run in registration order.

use crate::config::SiteConfig;
use crate::site::SiteContent;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Generator `{generator}` failed: {message}")]
pub struct GeneratorError {
    pub generator: String,
    pub message: String,
}

impl GeneratorError {
    pub fn new(generator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            generator: generator.into(),
            message: message.into(),
        }
    }
}

/// Trait for generators.
pub trait Generator: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    fn generate(&self, config: &SiteConfig, content: &mut SiteContent)
    -> Result<(), GeneratorError>;
}

/// Run every generator in order, stopping at the first failure.
pub fn run_all(
    generators: &[Box<dyn Generator>],
    config: &SiteConfig,
    content: &mut SiteContent,
) -> Result<(), GeneratorError> {
    for generator in generators {
        tracing::debug!(generator = generator.name(), "running generator");
        generator.generate(config, content)?;
    }
    Ok(())
}
