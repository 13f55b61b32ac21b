//! HTML-to-image render collaborator

use crate::error::{Result, ServerError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    /// Render a self-contained HTML document to PNG bytes
    async fn render(&self, html: &str, width: u32, height: u32) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    html: &'a str,
    width: u32,
    height: u32,
}

/// Renderer backed by an HTTP screenshot service
///
/// The service receives `{html, width, height}` and answers with image bytes.
pub struct HttpRenderer {
    http: reqwest::Client,
    url: String,
}

impl HttpRenderer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Render(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, html: &str, width: u32, height: u32) -> Result<Vec<u8>> {
        let response = self
            .http
            .post(&self.url)
            .json(&RenderRequest { html, width, height })
            .send()
            .await
            .map_err(|e| ServerError::Render(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::Render(format!("render service returned {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServerError::Render(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ServerError::Render("render service returned no image".to_string()));
        }

        debug!(size = bytes.len(), width, height, "Rendered image");
        Ok(bytes.to_vec())
    }
}

/// Escape text for interpolation into HTML content or attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("葬送的芙莉莲"), "葬送的芙莉莲");
    }

    #[tokio::test]
    async fn test_http_renderer_posts_document() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/render")
                    .json_body(serde_json::json!({"html": "<p>hi</p>", "width": 1200, "height": 1600}));
                then.status(200)
                    .header("content-type", "image/png")
                    .body([0x89, b'P', b'N', b'G']);
            })
            .await;

        let renderer = HttpRenderer::new(server.url("/render"), Duration::from_secs(5)).unwrap();
        let bytes = renderer.render("<p>hi</p>", 1200, 1600).await.unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, vec![0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn test_http_renderer_failure_is_render_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/render");
                then.status(503);
            })
            .await;

        let renderer = HttpRenderer::new(server.url("/render"), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            renderer.render("<p>hi</p>", 10, 10).await,
            Err(ServerError::Render(_))
        ));
    }
}
