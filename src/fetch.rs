//! URL → [`Document`] fetching.
//!
//! [`HttpFetcher`] downloads a page with a configurable User-Agent and turns
//! HTML into plain text: the `<article>`, `<main>` or `<body>` element (first
//! found) is walked, block elements become paragraphs separated by blank
//! lines, and script, style and navigation subtrees are dropped. Non-HTML
//! text bodies are used unchanged.

use anyhow::anyhow;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use thiserror::Error;

use rag_harness_core::models::Document;

use crate::config::FetchConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server responded with HTTP {0}")]
    Status(u16),

    #[error("page contains no text")]
    Empty,

    #[error("{0}")]
    Other(String),
}

/// Retrieves one URL as a [`Document`] whose `source` is the URL as given.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Document, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let parsed = url::Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let body = response.text().await?;

        let looks_like_html = content_type.contains("html")
            || (content_type.is_empty() && body.trim_start().starts_with('<'));
        let (title, text) = if looks_like_html {
            html_to_text(&body).map_err(|e| FetchError::Other(format!("{:#}", e)))?
        } else {
            (None, body.trim().to_string())
        };

        if text.trim().is_empty() {
            return Err(FetchError::Empty);
        }

        tracing::debug!(url, chars = text.chars().count(), "fetched document");
        Ok(Document {
            source: url.to_string(),
            title,
            text,
        })
    }
}

fn selector(css: &'static str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{}': {}", css, e))
}

/// Extract the page title and readable text from an HTML document.
pub fn html_to_text(html: &str) -> anyhow::Result<(Option<String>, String)> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut root = None;
    for css in ["article", "main", "body"] {
        root = document.select(&selector(css)?).next();
        if root.is_some() {
            break;
        }
    }
    let root = root.unwrap_or_else(|| document.root_element());

    let mut blocks = Vec::new();
    collect_blocks(root, &mut blocks);

    let text = if blocks.is_empty() {
        let mut raw = String::new();
        collect_text(root, &mut raw);
        collapse_whitespace(&raw)
    } else {
        blocks.join("\n\n")
    };

    Ok((title, text))
}

fn is_skipped(tag: &str) -> bool {
    matches!(
        tag,
        "script" | "style" | "template" | "noscript" | "svg" | "nav" | "head"
    )
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" | "pre" | "td" | "dd"
    )
}

/// Record each outermost block element's text once, in document order.
fn collect_blocks(element: ElementRef<'_>, blocks: &mut Vec<String>) {
    for child in element.children().filter_map(ElementRef::wrap) {
        let tag = child.value().name();
        if is_skipped(tag) {
            continue;
        }
        if is_block(tag) {
            let mut raw = String::new();
            collect_text(child, &mut raw);
            let text = if tag == "pre" {
                collapse_newlines(&raw)
            } else {
                collapse_whitespace(&raw)
            };
            if !text.is_empty() {
                blocks.push(text);
            }
        } else {
            collect_blocks(child, blocks);
        }
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for node in element.children() {
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(node) {
            if is_skipped(child.value().name()) {
                continue;
            }
            if child.value().name() == "br" {
                out.push('\n');
            } else {
                collect_text(child, out);
                out.push(' ');
            }
        }
    }
}

fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim().to_string()
}

fn collapse_newlines(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_blocks_become_paragraphs() {
        let html = r#"
            <html><head><title> Mortgage rates | News </title>
            <style>body { color: red }</style></head>
            <body>
              <nav><ul><li>Home</li><li>Markets</li></ul></nav>
              <article>
                <h1>Rates climb</h1>
                <p>The 30-year fixed rate rose to
                   <b>6.72%</b> on Dec. 20.</p>
                <script>track()</script>
                <ul><li>15-year: 5.9%</li></ul>
              </article>
            </body></html>
        "#;
        let (title, text) = html_to_text(html).unwrap();
        assert_eq!(title.as_deref(), Some("Mortgage rates | News"));
        assert_eq!(
            text,
            "Rates climb\n\nThe 30-year fixed rate rose to 6.72% on Dec. 20.\n\n15-year: 5.9%"
        );
    }

    #[test]
    fn test_nav_and_scripts_are_dropped_from_body() {
        let html = "<body><nav><p>Menu</p></nav><p>Kept</p><script>var x = 1;</script></body>";
        let (_, text) = html_to_text(html).unwrap();
        assert_eq!(text, "Kept");
    }

    #[test]
    fn test_nested_blocks_are_not_duplicated() {
        let html = "<body><blockquote><p>Quoted line</p></blockquote></body>";
        let (_, text) = html_to_text(html).unwrap();
        assert_eq!(text, "Quoted line");
    }

    #[test]
    fn test_falls_back_to_loose_text() {
        let html = "<body><div>Just   a <span>div</span></div></body>";
        let (title, text) = html_to_text(html).unwrap();
        assert!(title.is_none());
        assert_eq!(text, "Just a div");
    }

    #[test]
    fn test_pre_keeps_line_structure() {
        let html = "<main><pre>line one\n\n  line two\n</pre></main>";
        let (_, text) = html_to_text(html).unwrap();
        assert_eq!(text, "line one\n  line two");
    }

    #[tokio::test]
    async fn test_rejects_bad_urls_without_network() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        assert!(matches!(
            fetcher.fetch("not a url").await,
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            fetcher.fetch("ftp://example.com/file.txt").await,
            Err(FetchError::UnsupportedScheme(s)) if s == "ftp"
        ));
    }
}
