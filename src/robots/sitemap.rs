//! Sitemap XML scanning
//!
//! Sitemaps are flat enough that a tag scanner is sufficient: the root
//! element decides between a URL set and a sitemap index, and every
//! `<loc>` value is collected.

use thiserror::Error;

/// Errors produced while reading a sitemap document
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SitemapError {
    #[error("sitemap has no root element")]
    Empty,

    #[error("unexpected sitemap root element <{0}>")]
    UnexpectedRoot(String),

    #[error("unterminated <loc> element")]
    Unterminated,
}

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sitemap {
    /// `<urlset>`: page URLs
    UrlSet(Vec<String>),
    /// `<sitemapindex>`: URLs of further sitemaps
    Index(Vec<String>),
}

/// Parses a sitemap document
///
/// # Example
///
/// ```
/// use spider::robots::{parse_sitemap, Sitemap};
///
/// let xml = b"<?xml version=\"1.0\"?><urlset><url><loc>https://x.com/a/</loc></url></urlset>";
/// assert_eq!(parse_sitemap(xml).unwrap(), Sitemap::UrlSet(vec!["https://x.com/a/".to_string()]));
/// ```
pub fn parse_sitemap(bytes: &[u8]) -> Result<Sitemap, SitemapError> {
    let xml = String::from_utf8_lossy(bytes);
    let root = root_element(&xml).ok_or(SitemapError::Empty)?;
    let locs = extract_locs(&xml)?;

    // Namespaced roots like <sm:urlset> are matched on the local name
    let local = root.rsplit(':').next().unwrap_or(root.as_str());
    match local {
        "urlset" => Ok(Sitemap::UrlSet(locs)),
        "sitemapindex" => Ok(Sitemap::Index(locs)),
        _ => Err(SitemapError::UnexpectedRoot(root.clone())),
    }
}

/// Name of the first element, skipping the XML declaration, comments and doctype
fn root_element(xml: &str) -> Option<String> {
    let mut rest = xml;
    loop {
        let open = rest.find('<')?;
        rest = &rest[open + 1..];

        if let Some(after) = rest.strip_prefix("!--") {
            rest = &after[after.find("-->")? + 3..];
            continue;
        }
        if rest.starts_with('?') || rest.starts_with('!') {
            rest = &rest[rest.find('>')? + 1..];
            continue;
        }

        let name: String = rest
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
            .collect();
        return if name.is_empty() { None } else { Some(name) };
    }
}

fn extract_locs(xml: &str) -> Result<Vec<String>, SitemapError> {
    let mut out = Vec::new();
    let mut start = 0usize;

    while let Some(open_idx) = xml[start..].find("<loc>") {
        let open = start + open_idx + "<loc>".len();
        let close = xml[open..]
            .find("</loc>")
            .map(|rel| open + rel)
            .ok_or(SitemapError::Unterminated)?;

        let value = decode_text(xml[open..close].trim());
        if !value.is_empty() {
            out.push(value);
        }
        start = close + "</loc>".len();
    }

    Ok(out)
}

/// Unwraps CDATA and decodes the predefined XML entities
fn decode_text(raw: &str) -> String {
    if let Some(inner) = raw
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
    {
        return inner.trim().to_string();
    }

    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
