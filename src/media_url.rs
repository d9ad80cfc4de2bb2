//! Submission URL validation and normalization

use crate::error::{Error, Result};
use url::Url;

/// Hosts whose `/watch` pages carry playlist and tracking parameters
const WATCH_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];

/// Parse a submitted URL, requiring an http(s) scheme and a non-empty host
pub fn validate_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::Validation("missing required field: url".into()));
    }

    let url = Url::parse(raw).map_err(|e| Error::Validation(format!("{raw}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Validation(format!(
            "unsupported scheme '{}', expected http or https",
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::Validation(format!("{raw}: missing host")));
    }

    Ok(url)
}

/// Strip playlist and tracking parameters for known video-sharing patterns.
///
/// For watch pages only the `v` parameter is kept, so
/// `https://youtube.com/watch?v=abc&list=xyz` becomes
/// `https://youtube.com/watch?v=abc`. Other URLs are returned unchanged.
pub fn normalize_url(mut url: Url) -> String {
    let is_watch_page = url
        .host_str()
        .is_some_and(|host| WATCH_HOSTS.contains(&host))
        && url.path() == "/watch";

    if is_watch_page
        && let Some(video_id) = url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
    {
        url.query_pairs_mut().clear().append_pair("v", &video_id);
        url.set_fragment(None);
    }

    url.into()
}

/// Validate then normalize in one step
pub fn prepare_url(raw: &str) -> Result<String> {
    validate_url(raw).map(normalize_url)
}
