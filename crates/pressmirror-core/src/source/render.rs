use chrono::SecondsFormat;

use pressmirror_types::Item;

/// An article document ready for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    /// Content the platform cannot accept; permanent for this item
    #[error("Unsupported content: {0}")]
    Validation(String),
    #[error("Render failed: {0}")]
    Internal(String),
}

impl RenderError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub trait Renderer: Send + Sync {
    fn render(&self, item: &Item) -> Result<Rendered, RenderError>;
}

/// Wraps the stored body in a minimal article document.
#[derive(Debug, Clone, Default)]
pub struct BasicRenderer {
    style: Option<String>,
}

impl BasicRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }
}

impl Renderer for BasicRenderer {
    fn render(&self, item: &Item) -> Result<Rendered, RenderError> {
        let body = item.body.trim();
        if body.is_empty() {
            return Err(RenderError::Validation(format!("{} has an empty body", item.canonical)));
        }
        let lowered = body.to_ascii_lowercase();
        if lowered.contains("<script") {
            return Err(RenderError::Validation("inline scripts are not supported".to_string()));
        }

        let mut warnings = Vec::new();
        if lowered.contains("<iframe") {
            warnings.push("iframe embeds render without an op-interactive figure".to_string());
        }

        let mut head = format!(
            "<meta charset=\"utf-8\"><link rel=\"canonical\" href=\"{}\">\
             <meta property=\"op:markup_version\" content=\"v1.0\">",
            escape(&item.canonical)
        );
        if let Some(style) = &self.style {
            head.push_str(&format!("<meta property=\"fb:article_style\" content=\"{}\">", escape(style)));
        }

        let mut header = format!("<h1>{}</h1>", escape(&item.title));
        if let Some(published) = item.published_at {
            let stamp = published.to_rfc3339_opts(SecondsFormat::Secs, true);
            header.push_str(&format!(
                "<time class=\"op-published\" datetime=\"{stamp}\">{}</time>",
                published.format("%B %-d, %Y")
            ));
        }
        if let Some(updated) = item.updated_at {
            let stamp = updated.to_rfc3339_opts(SecondsFormat::Secs, true);
            header.push_str(&format!("<time class=\"op-modified\" datetime=\"{stamp}\"></time>"));
        }

        let html = format!(
            "<!doctype html><html lang=\"en\" prefix=\"op: http://media.facebook.com/op#\">\
             <head>{head}</head><body><article><header>{header}</header>{body}</article></body></html>"
        );
        Ok(Rendered { html, warnings })
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pressmirror_types::ArticleContent;

    fn item(body: &str) -> Item {
        Item::from_content(ArticleContent {
            id: "1".to_string(),
            canonical: "https://x/a?b=1&c=2".to_string(),
            title: "Q&A: \"rates\"".to_string(),
            body: body.to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).single(),
            updated_at: None,
        })
    }

    #[test]
    fn test_render_document() {
        let rendered = BasicRenderer::new().with_style("default").render(&item("<p>Hi</p>")).unwrap();
        assert!(rendered.warnings.is_empty());
        assert!(rendered.html.contains("<link rel=\"canonical\" href=\"https://x/a?b=1&amp;c=2\">"));
        assert!(rendered.html.contains("<h1>Q&amp;A: &quot;rates&quot;</h1>"));
        assert!(rendered.html.contains("datetime=\"2024-03-05T09:30:00Z\">March 5, 2024</time>"));
        assert!(rendered.html.contains("fb:article_style"));
        assert!(rendered.html.ends_with("<p>Hi</p></article></body></html>"));
    }

    #[test]
    fn test_empty_body_is_rejected() {
        let err = BasicRenderer::new().render(&item("   ")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_script_is_rejected() {
        let err = BasicRenderer::new().render(&item("<p>x</p><SCRIPT>alert(1)</SCRIPT>")).unwrap_err();
        assert!(matches!(err, RenderError::Validation(_)));
    }

    #[test]
    fn test_iframe_is_a_warning() {
        let rendered = BasicRenderer::new().render(&item("<iframe src=\"https://v\"></iframe>")).unwrap();
        assert_eq!(rendered.warnings.len(), 1);
    }
}
