//! HTTP helpers for catalog implementations
//!
//! Maps HTTP responses onto the [`CatalogError`] taxonomy and turns stream
//! responses into a [`ByteStream`].

use super::ByteStream;
use crate::error::CatalogError;
use futures::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use std::sync::OnceLock;
use std::time::Duration;

/// Client for requests that need no catalog session, such as cover art
pub fn shared_client() -> &'static Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT.get_or_init(Client::new)
}

/// Classify an HTTP status; `None` means success
pub fn classify_status(status: StatusCode, headers: &HeaderMap, context: &str) -> Option<CatalogError> {
    if status.is_success() {
        return None;
    }
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CatalogError::Unauthorized(format!("{context}: HTTP {status}"))
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            CatalogError::NotFound(format!("{context}: HTTP {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => CatalogError::RateLimited {
            retry_after: retry_after(headers),
        },
        s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => {
            CatalogError::Transient(format!("{context}: HTTP {status}"))
        }
        _ => CatalogError::NotFound(format!("{context}: unexpected HTTP {status}")),
    };
    Some(err)
}

/// `Retry-After` in seconds, if present and numeric
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Classify a transport-level failure
pub fn classify_error(err: &reqwest::Error, context: &str) -> CatalogError {
    if let Some(status) = err.status() {
        if let Some(classified) = classify_status(status, &HeaderMap::new(), context) {
            return classified;
        }
    }
    CatalogError::Transient(format!("{context}: {err}"))
}

/// Turn a successful response into a byte stream
pub fn response_stream(response: Response) -> ByteStream {
    response
        .bytes_stream()
        .map(|chunk| {
            chunk
                .map(|b| b.to_vec())
                .map_err(|e| CatalogError::Transient(format!("stream interrupted: {e}")))
        })
        .boxed()
}

/// GET a signed stream URL and return its bytes and expected length
pub async fn open_stream(client: &Client, url: &str) -> Result<(ByteStream, Option<u64>), CatalogError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify_error(&e, "stream request"))?;

    if let Some(err) = classify_status(response.status(), response.headers(), "stream request") {
        return Err(err);
    }

    let size = response.content_length();
    Ok((response_stream(response), size))
}

/// Check that `url` answers at all
///
/// Any HTTP response other than a server error counts as reachable; the
/// endpoint may well reject unauthenticated requests.
pub async fn check_reachable(client: &Client, url: &str) -> Result<StatusCode, CatalogError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify_error(&e, "reachability check"))?;
    let status = response.status();
    if status.is_server_error() {
        return Err(CatalogError::Transient(format!("reachability check: HTTP {status}")));
    }
    Ok(status)
}
