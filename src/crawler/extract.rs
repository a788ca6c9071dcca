//! HTML content extraction
//!
//! This module turns a fetched HTML document into:
//! - Links to follow (from `<a>` tags and canonical links)
//! - Image sources
//! - Page metadata (title, description, Open Graph fields, keywords, icons)

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Descriptive metadata of a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub site_name: Option<String>,
    pub locale: Option<String>,
    pub keywords: Vec<String>,
    pub icons: Vec<String>,
}

/// Everything extracted from one HTML document
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    /// Absolute http(s) link targets, in document order
    pub links: Vec<String>,
    /// Absolute image sources
    pub images: Vec<String>,
    pub metadata: PageMetadata,
}

/// Extracts links, images and metadata from an HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
///
/// Relative references resolve against `base_url`. Malformed markup never
/// fails: the HTML parser recovers and whatever can be found is returned.
///
/// # Example
///
/// ```
/// use spider::crawler::extract_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let page = extract_page(html, &base_url);
/// assert_eq!(page.metadata.title, Some("Test".to_string()));
/// assert_eq!(page.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn extract_page(html: &str, base_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);

    ExtractedPage {
        links: extract_links(&document, base_url),
        images: extract_images(&document, base_url),
        metadata: extract_metadata(&document, base_url),
    }
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    for element in select(document, "a[href]") {
        if element.value().attr("download").is_some() {
            continue;
        }
        if let Some(link) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
            links.push(link);
        }
    }

    for element in select(document, "link[rel='canonical'][href]") {
        if let Some(link) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
            links.push(link);
        }
    }

    links
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<String> {
    select(document, "img[src]")
        .into_iter()
        .filter_map(|element| element.value().attr("src"))
        .filter_map(|src| resolve_link(src, base_url))
        .collect()
}

fn extract_metadata(document: &Html, base_url: &Url) -> PageMetadata {
    let title = meta_property(document, "og:title").or_else(|| {
        select(document, "title")
            .first()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    });

    let description =
        meta_property(document, "og:description").or_else(|| meta_name(document, "description"));

    let keywords = meta_name(document, "keywords")
        .map(|raw| {
            raw.split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let icons = select(document, "link[rel][href]")
        .into_iter()
        .filter(|element| {
            element
                .value()
                .attr("rel")
                .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("icon")))
                .unwrap_or(false)
        })
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect();

    PageMetadata {
        title,
        description,
        kind: meta_property(document, "og:type"),
        site_name: meta_property(document, "og:site_name"),
        locale: meta_property(document, "og:locale"),
        keywords,
        icons,
    }
}

/// Content of `<meta property="...">`, the Open Graph form
fn meta_property(document: &Html, property: &str) -> Option<String> {
    meta_content(document, &format!("meta[property='{}'][content]", property))
}

/// Content of `<meta name="...">`
fn meta_name(document: &Html, name: &str) -> Option<String> {
    meta_content(document, &format!("meta[name='{}'][content]", name))
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    select(document, selector)
        .first()
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

fn select<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only references
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
