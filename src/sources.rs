//! Source construction from raw search hits.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::search::SearchResult;

/// Date marker for hits without a publish date.
pub const UNKNOWN_DATE: &str = "N/A";

const FAVICON_ENDPOINT: &str =
    "https://t0.gstatic.com/faviconV2?client=SOCIAL&type=FAVICON&fallback_opts=TYPE,SIZE,URL";

/// A search hit as surfaced to the model and cited in the answer. Immutable
/// once built; `id` is the hit's position in the accepted list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub date: String,
    pub domain: String,
    pub favicon: String,
}

/// Map raw hits to sources, dropping hits whose URL is not an absolute URL
/// with a host. Ids are assigned after filtering so they stay contiguous.
#[must_use]
pub fn build_sources(results: &[SearchResult]) -> Vec<Source> {
    results
        .iter()
        .filter_map(|result| match parse_absolute(&result.url) {
            Some(parsed) => Some((result, parsed)),
            None => {
                debug!(url = %result.url, "dropping search result with malformed url");
                None
            }
        })
        .enumerate()
        .map(|(index, (result, parsed))| Source {
            id: index.to_string(),
            title: result.title.clone(),
            content: result.text().to_string(),
            url: result.url.clone(),
            date: result
                .published_date
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_DATE.to_string()),
            domain: parsed.host_str().unwrap_or_default().to_string(),
            favicon: favicon_url(&result.url),
        })
        .collect()
}

fn parse_absolute(raw: &str) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    url.host_str().filter(|h| !h.is_empty())?;
    Some(url)
}

/// Favicon lookup URL for a page.
#[must_use]
pub fn favicon_url(page_url: &str) -> String {
    format!("{FAVICON_ENDPOINT}&url={}&size=32", urlencoding::encode(page_url))
}
