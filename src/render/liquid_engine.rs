//! Liquid templates through the `liquid` crate.
//!
//! Selected with `templates = "liquid"`. Supports the Liquid standard
//! library: `for`, `if`, `assign`, `capture` and the stock filters. The
//! payload is flattened into a Liquid object per render.

use super::template::{TemplateEngine, TemplateError};
use crate::payload::Payload;
use std::sync::OnceLock;

/// Liquid engine. The parser is built on first use and shared by every
/// worker.
#[derive(Default)]
pub struct LiquidEngine {
    parser: OnceLock<Result<liquid::Parser, String>>,
}

impl LiquidEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parser(&self) -> Result<&liquid::Parser, TemplateError> {
        self.parser
            .get_or_init(|| {
                liquid::ParserBuilder::with_stdlib()
                    .build()
                    .map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|e| TemplateError::Liquid(e.clone()))
    }
}

fn liquid_error(e: liquid::Error) -> TemplateError {
    TemplateError::Liquid(e.to_string())
}

impl TemplateEngine for LiquidEngine {
    fn render(&self, template: &str, payload: &Payload<'_>) -> Result<String, TemplateError> {
        let template = self.parser()?.parse(template).map_err(liquid_error)?;
        let globals = liquid::model::to_object(&payload.to_value()).map_err(liquid_error)?;
        template.render(&globals).map_err(liquid_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, root: serde_json::Value) -> Result<String, TemplateError> {
        LiquidEngine::new().render(template, &Payload::new(&root))
    }

    #[test]
    fn loops_over_site_posts() {
        let root = json!({"site": {"posts": [{"title": "B"}, {"title": "A"}]}});
        let out = render(
            "{% for post in site.posts %}<li>{{ post.title }}</li>{% endfor %}",
            root,
        )
        .unwrap();
        assert_eq!(out, "<li>B</li><li>A</li>");
    }

    #[test]
    fn conditionals_and_stock_filters() {
        let root = json!({"page": {"title": "hello", "tags": ["a", "b"]}});
        let out = render(
            "{% if page.title == \"hello\" %}{{ page.title | upcase }}: {{ page.tags | join: \", \" }}{% endif %}",
            root,
        )
        .unwrap();
        assert_eq!(out, "HELLO: a, b");
    }

    #[test]
    fn document_layers_are_visible() {
        let root = json!({"site": {"title": "T"}});
        let mut payload = Payload::new(&root);
        payload.insert("content", json!("<p>body</p>"));
        payload.insert_site("related_posts", json!([{"title": "R"}]));
        let out = LiquidEngine::new()
            .render(
                "{{ site.title }}|{{ content }}|{% for p in site.related_posts %}{{ p.title }}{% endfor %}",
                &payload,
            )
            .unwrap();
        assert_eq!(out, "T|<p>body</p>|R");
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = render("{% for x in %}", json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::Liquid(_)));
    }
}
