use super::host::canonical_host;
use url::Url;

/// Path prefixes of functional pages that carry no crawlable content
const DENIED_PATH_PREFIXES: &[&str] = &[
    "/login",
    "/logout",
    "/register",
    "/signup",
    "/password-reset",
    "/account/",
    "/cart",
    "/checkout",
    "/order/",
    "/payment/",
    "/search",
    "/filter/",
    "/admin/",
    "/dashboard/",
    "/settings/",
    "/404",
    "/error/",
    "/maintenance",
    "/test/",
    "/print/",
    "/preview/",
    "/tag/",
];

/// Query parameters that open up pagination/sorting/search permutation spaces
const DENIED_QUERY_PARAMS: &[&str] = &["sort", "page", "filter", "q", "search"];

/// File extensions that never point at an HTML page
const DENIED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", // documents
    "zip", "rar", "7z", "tar", "gz", "exe", "msi", "dmg", "apk", // archives
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "svg", // images
    "mp3", "wav", "aac", "ogg", "flac", // audio
    "mp4", "avi", "mov", "wmv", "mkv", "flv", "webm", // video
    "css", "js", "ico", // assets
];

/// Normalizes a raw URL string into its canonical frontier form
///
/// # Normalization Steps
///
/// 1. Reject empty input and fragment-only references
/// 2. Resolve against `https://<base_host>/` (relative references take the base host)
/// 3. Reject non-HTTP(S) schemes, denylisted extensions, functional paths
///    and permutation query parameters
/// 4. Force `https`, lowercase the host and strip `www.`
/// 5. Drop the fragment
/// 6. Sort query parameters by key (stable for repeated keys)
/// 7. Append `/` to extension-less paths when there is no query
///
/// Returns `None` for anything unparsable or filtered.
///
/// # Examples
///
/// ```
/// use spider::url::normalize;
///
/// let url = normalize("http://WWW.Example.com/Foo", "").unwrap();
/// assert_eq!(url, "https://example.com/Foo/");
///
/// assert_eq!(normalize("/login", "example.com"), None);
/// ```
pub fn normalize(raw: &str, base_host: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let mut url = parse_with_base(raw, base_host)?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    if is_denied_path(url.path()) || has_denied_query(&url) {
        return None;
    }

    if url.scheme() == "http" {
        url.set_scheme("https").ok()?;
    }

    let host = canonical_host(url.host_str()?);
    if host.is_empty() {
        return None;
    }
    url.set_host(Some(&host)).ok()?;

    url.set_fragment(None);

    sort_query_params(&mut url);

    if url.query().is_none() && needs_trailing_slash(url.path()) {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Some(url.to_string())
}

/// Parses `raw`, resolving relative references against the base host
fn parse_with_base(raw: &str, base_host: &str) -> Option<Url> {
    let base_host = canonical_host(base_host);
    if base_host.is_empty() {
        return Url::parse(raw).ok();
    }

    let base = Url::parse(&format!("https://{}/", base_host)).ok()?;
    base.join(raw).ok()
}

/// Checks the path against denylisted extensions and functional prefixes
fn is_denied_path(path: &str) -> bool {
    let path = path.to_lowercase();

    if let Some(ext) = last_segment(&path).rsplit_once('.').map(|(_, ext)| ext) {
        if DENIED_EXTENSIONS.contains(&ext) {
            return true;
        }
    }

    DENIED_PATH_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

fn has_denied_query(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, _)| DENIED_QUERY_PARAMS.contains(&key.as_ref()))
}

/// Reorders query parameters alphabetically by key, preserving repeated values
fn sort_query_params(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if params.is_empty() {
        url.set_query(None);
        return;
    }

    // sort_by is stable, so repeated keys keep their relative order
    params.sort_by(|a, b| a.0.cmp(&b.0));
    url.query_pairs_mut().clear().extend_pairs(params);
}

fn needs_trailing_slash(path: &str) -> bool {
    !path.is_empty() && !path.ends_with('/') && !last_segment(path).contains('.')
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
