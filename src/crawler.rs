use std::sync::LazyLock;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::{info, warn};

static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static BLANKS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// One crawled page: its Markdown rendering plus the title used to label
/// every chunk extracted from it.
#[derive(Debug)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub markdown: String,
}

/// Crawl stats returned after completion.
pub struct CrawlStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Crawl pages sequentially, reusing one Spider session for every visit.
///
/// A failed page is logged and skipped; the run continues with the next URL.
pub async fn crawl_sequential(urls: &[String]) -> Result<(Vec<Page>, CrawlStats)> {
    let api_key = std::env::var("SPIDER_API_KEY")
        .context("SPIDER_API_KEY environment variable must be set")?;
    let spider = Spider::new(Some(api_key))
        .map_err(|e| anyhow::anyhow!("Failed to create Spider client: {}", e))?;

    let total = urls.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut pages = Vec::with_capacity(total);
    let mut ok = 0usize;
    let mut errors = 0usize;

    for url in urls {
        match crawl_one(&spider, url).await {
            Ok(page) => {
                ok += 1;
                pages.push(page);
            }
            Err(e) => {
                errors += 1;
                warn!("Failed to crawl {}: {}", url, e);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Crawled {} pages ({} ok, {} errors)", total, ok, errors);

    Ok((pages, CrawlStats { total, ok, errors }))
}

async fn crawl_one(spider: &Spider, url: &str) -> Result<Page> {
    let params = RequestParams {
        return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Markdown)),
        ..Default::default()
    };

    let response = spider
        .scrape_url(url, Some(params), "application/json")
        .await
        .map_err(|e| anyhow::anyhow!("Spider scrape failed: {}", e))?;

    parse_response(url, response)
}

/// Turn a spider response into a `Page`.
///
/// The response may be a JSON string wrapping the real payload, and the
/// payload may be a single object or an array whose first element is the
/// page. A response without a `content` string is an error (the caller
/// logs and skips the page).
fn parse_response(url: &str, response: serde_json::Value) -> Result<Page> {
    let parsed: serde_json::Value = match response.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
        None => response,
    };

    let first = parsed.as_array().and_then(|arr| arr.first()).unwrap_or(&parsed);

    let markdown = first
        .get("content")
        .and_then(|c| c.as_str())
        .map(strip_images)
        .ok_or_else(|| anyhow::anyhow!("No content in spider response"))?;

    let title = metadata_title(first).unwrap_or_else(|| title_from_url(url));

    Ok(Page {
        url: url.to_string(),
        title,
        markdown,
    })
}

/// Pull the page title out of the response metadata, if the crawler
/// reported one.
fn metadata_title(obj: &serde_json::Value) -> Option<String> {
    let title = obj.get("metadata")?.get("title")?.as_str()?.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Fallback title: the URL's last non-empty path segment, or the host when
/// the path is bare.
fn title_from_url(url: &str) -> String {
    let without_scheme = url.splitn(2, "://").nth(1).unwrap_or(url);
    let path = without_scheme.split(['?', '#']).next().unwrap_or("");
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let host = segments.next().unwrap_or("untitled");
    segments.last().unwrap_or(host).to_string()
}

/// Remove markdown image syntax: ![alt](url) and [![alt](url)](link)
fn strip_images(md: &str) -> String {
    let cleaned = IMAGE_RE.replace_all(md, "");
    BLANKS_RE.replace_all(&cleaned, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn title_from_metadata() {
        let obj = json!({"content": "# Hi", "metadata": {"title": "Intro Page"}});
        assert_eq!(metadata_title(&obj).as_deref(), Some("Intro Page"));
    }

    #[test]
    fn blank_metadata_title_is_none() {
        let obj = json!({"metadata": {"title": "   "}});
        assert_eq!(metadata_title(&obj), None);
        assert_eq!(metadata_title(&json!({"content": "x"})), None);
    }

    #[test]
    fn title_falls_back_to_last_path_segment() {
        assert_eq!(title_from_url("https://docs.example.com/core/installation"), "installation");
        assert_eq!(title_from_url("https://docs.example.com/core/installation/"), "installation");
        assert_eq!(title_from_url("https://example.com/page?x=1"), "page");
    }

    #[test]
    fn bare_path_titles_as_host() {
        assert_eq!(title_from_url("https://docs.example.com/"), "docs.example.com");
        assert_eq!(title_from_url("https://docs.example.com"), "docs.example.com");
    }

    #[test]
    fn parse_response_array_payload() {
        let value = json!([{"content": "# Intro\n\nBody.", "metadata": {"title": "Intro Page"}}]);
        let page = parse_response("https://example.com/docs/intro", value).unwrap();
        assert_eq!(page.url, "https://example.com/docs/intro");
        assert_eq!(page.title, "Intro Page");
        assert_eq!(page.markdown, "# Intro\n\nBody.");
    }

    #[test]
    fn parse_response_single_object_payload() {
        let value = json!({"content": "Body."});
        let page = parse_response("https://example.com/docs/intro", value).unwrap();
        assert_eq!(page.markdown, "Body.");
    }

    #[test]
    fn parse_response_string_wrapped_payload() {
        let value = json!(r#"[{"content": "Body.", "metadata": {"title": "T"}}]"#);
        let page = parse_response("https://example.com/a", value).unwrap();
        assert_eq!(page.title, "T");
        assert_eq!(page.markdown, "Body.");
    }

    #[test]
    fn parse_response_without_content_is_an_error() {
        let err = parse_response("https://example.com/a", json!([{"status": 404}])).unwrap_err();
        assert!(err.to_string().contains("No content"));
        assert!(parse_response("https://example.com/a", json!([])).is_err());
    }

    #[test]
    fn parse_response_title_falls_back_to_url() {
        let value = json!([{"content": "Body."}]);
        let page = parse_response("https://example.com/docs/intro", value).unwrap();
        assert_eq!(page.title, "intro");
    }

    #[test]
    fn parse_response_strips_images_from_content() {
        let value = json!([{"content": "Before ![logo](https://x.y/l.png) after"}]);
        let page = parse_response("https://example.com/a", value).unwrap();
        assert_eq!(page.markdown, "Before  after");
    }

    #[test]
    fn strip_images_removes_image_syntax() {
        let md = "Before ![logo](https://x.y/l.png) after";
        assert_eq!(strip_images(md), "Before  after");
    }

    #[test]
    fn strip_images_collapses_blank_runs() {
        let md = "a\n\n\n\n\nb";
        assert_eq!(strip_images(md), "a\n\nb");
    }
}
