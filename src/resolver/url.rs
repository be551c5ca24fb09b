//! Catalog URL parsing.

use crate::error::ResolutionError;
use crate::types::{CatalogUrl, UrlKind};
use regex::Regex;
use std::sync::OnceLock;

/// Path shape: optional locale, entity kind, any number of slug segments, ID last
const PATH_PATTERN: &str =
    r"^/(?:[a-z]{2}-[a-z]{2}/)?(album|track|artist|interpreter|playlist|label)/(?:[^/]+/)*([\w-]+)/?$";

static PATH_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// Parse a catalog URL into its entity kind and ID
///
/// Accepts `www.`, `open.` and `play.` hosts, with or without a scheme,
/// locale prefix or slug. `interpreter` URLs are artist URLs.
///
/// ```
/// use qobuz_dl::resolver::parse_catalog_url;
/// use qobuz_dl::types::UrlKind;
///
/// let url = parse_catalog_url("https://www.qobuz.com/gb-en/album/the-wall/xyz123").unwrap();
/// assert_eq!(url.kind, UrlKind::Album);
/// assert_eq!(url.id, "xyz123");
/// ```
pub fn parse_catalog_url(raw: &str) -> Result<CatalogUrl, ResolutionError> {
    let trimmed = raw.trim();
    let unsupported = || ResolutionError::UnsupportedUrl(trimmed.to_string());

    let parsed = url::Url::parse(trimmed)
        .or_else(|_| url::Url::parse(&format!("https://{trimmed}")))
        .map_err(|_| unsupported())?;

    let host = parsed.host_str().ok_or_else(unsupported)?;
    if host != "qobuz.com" && !host.ends_with(".qobuz.com") {
        return Err(unsupported());
    }

    let re = PATH_RE
        .get_or_init(|| Regex::new(PATH_PATTERN))
        .as_ref()
        .map_err(|e| ResolutionError::UnsupportedUrl(format!("{trimmed}: {e}")))?;
    let caps = re.captures(parsed.path()).ok_or_else(unsupported)?;

    let kind = caps
        .get(1)
        .and_then(|m| UrlKind::from_segment(m.as_str()))
        .ok_or_else(unsupported)?;
    let id = caps.get(2).map(|m| m.as_str().to_string()).ok_or_else(unsupported)?;

    Ok(CatalogUrl {
        kind,
        id,
        raw: trimmed.to_string(),
    })
}
