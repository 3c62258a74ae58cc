use anyhow::{Context, Result};
use tracing::{debug, info};

/// Well-known sitemap locations, tried in order under the base URL.
const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/sitemap/sitemap.xml"];

/// Discover a site's page URLs via its sitemap.
///
/// Tries each well-known sitemap path under `base_url` and returns the URLs
/// from the first candidate that yields any. Fetch and parse errors on a
/// candidate are swallowed so the next one can be tried. Returns an empty
/// vec when no candidate works out.
pub async fn discover_urls(client: &reqwest::Client, base_url: &str) -> Result<Vec<String>> {
    let base = base_url.trim_end_matches('/');

    for path in SITEMAP_PATHS {
        let sitemap_url = format!("{base}{path}");
        match fetch_sitemap(client, &sitemap_url).await {
            Ok(urls) if !urls.is_empty() => {
                info!("Sitemap {} yielded {} URLs", sitemap_url, urls.len());
                return Ok(urls);
            }
            Ok(_) => debug!("Sitemap {} contained no URLs", sitemap_url),
            Err(e) => debug!("Sitemap candidate {} failed: {}", sitemap_url, e),
        }
    }

    Ok(Vec::new())
}

/// Fetch one sitemap document and return its leaf page URLs.
///
/// If the document is a sitemap index, each listed sub-sitemap is fetched
/// and its leaf URLs collected. Recursion stops there: an index nested
/// inside a sub-sitemap is not followed.
async fn fetch_sitemap(client: &reqwest::Client, url: &str) -> Result<Vec<String>> {
    let xml = fetch_xml(client, url).await?;
    let doc = parse_sitemap(&xml)?;

    if doc.sitemaps.is_empty() {
        return Ok(doc.urls);
    }

    debug!("{} is a sitemap index ({} sub-sitemaps)", url, doc.sitemaps.len());
    let mut sub_docs = Vec::new();
    for sub in &doc.sitemaps {
        let xml = match fetch_xml(client, sub).await {
            Ok(xml) => xml,
            Err(e) => {
                debug!("Sub-sitemap {} failed: {}", sub, e);
                continue;
            }
        };
        match parse_sitemap(&xml) {
            Ok(sub_doc) => sub_docs.push(sub_doc),
            Err(e) => debug!("Sub-sitemap {} unparseable: {}", sub, e),
        }
    }
    Ok(aggregate_leaf_urls(sub_docs))
}

/// Combine the parsed sub-sitemaps of an index into one leaf URL list, in
/// order. Indirection stops after one level: a sub-sitemap that is itself
/// an index has no leaf URLs and contributes nothing, so a
/// self-referencing index still terminates.
fn aggregate_leaf_urls(sub_docs: Vec<SitemapDoc>) -> Vec<String> {
    sub_docs.into_iter().flat_map(|doc| doc.urls).collect()
}

async fn fetch_xml(client: &reqwest::Client, url: &str) -> Result<String> {
    client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
        .with_context(|| format!("Failed to fetch sitemap {url}"))
}

/// Parsed sitemap document: sub-sitemap locations (non-empty for a sitemap
/// index) and leaf page URLs.
#[derive(Debug, Default)]
struct SitemapDoc {
    sitemaps: Vec<String>,
    urls: Vec<String>,
}

/// Parse a sitemap XML document, collecting <loc> values under <sitemap>
/// (index entries) and <url> (leaf entries) separately. Matches on element
/// local names so namespace-prefixed documents parse the same way.
fn parse_sitemap(xml: &str) -> Result<SitemapDoc> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut doc = SitemapDoc::default();
    let mut in_sitemap = false;
    let mut in_url = false;
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"sitemap" => in_sitemap = true,
                b"url" => in_url = true,
                b"loc" if in_sitemap || in_url => in_loc = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(e)) if in_loc => {
                let loc = e.unescape()?.trim().to_string();
                if !loc.is_empty() {
                    if in_sitemap {
                        doc.sitemaps.push(loc);
                    } else {
                        doc.urls.push(loc);
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match local_name(e.name().as_ref()) {
                b"loc" => in_loc = false,
                b"sitemap" => in_sitemap = false,
                b"url" => in_url = false,
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(doc)
}

/// Strip any namespace prefix from a qualified element name.
fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}
