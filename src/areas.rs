use std::fmt;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// A value of the area drop-down on the Find-a-Meeting page.
/// Stored exactly as the page has it, since it is sent back verbatim when
/// selecting the option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AreaCode(String);

impl AreaCode {
    /// Returns `None` for empty or whitespace-only values.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(AreaCode(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AreaCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AreaCode::new(value).ok_or_else(|| "area code must not be empty".to_string())
    }
}

impl From<AreaCode> for String {
    fn from(code: AreaCode) -> String {
        code.0
    }
}

impl fmt::Display for AreaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no <select id=\"{0}\"> on the directory page")]
    SelectNotFound(String),

    #[error("invalid select id {0:?}")]
    BadSelector(String),
}

/// Fetch the directory page and return its area codes in page order.
pub async fn fetch_area_codes(
    client: &reqwest::Client,
    url: &str,
    select_id: &str,
) -> Result<Vec<AreaCode>, DiscoveryError> {
    info!("Fetching area list: {}", url);
    let http_err = |source| DiscoveryError::Http {
        url: url.to_string(),
        source,
    };

    let html = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(http_err)?
        .text()
        .await
        .map_err(http_err)?;

    let codes = parse_area_codes(&html, select_id)?;
    info!("Found {} area codes", codes.len());
    Ok(codes)
}

/// Extract the option values of `select#<select_id>`.
///
/// Region headers ("South West", ...) carry an empty value and are dropped.
/// Order and duplicates are kept as they appear in the page.
pub fn parse_area_codes(html: &str, select_id: &str) -> Result<Vec<AreaCode>, DiscoveryError> {
    let select_sel = Selector::parse(&format!("select#{}", select_id))
        .map_err(|_| DiscoveryError::BadSelector(select_id.to_string()))?;
    let option_sel = Selector::parse("option").expect("static selector");

    let document = Html::parse_document(html);
    let select = document
        .select(&select_sel)
        .next()
        .ok_or_else(|| DiscoveryError::SelectNotFound(select_id.to_string()))?;

    let codes = select
        .select(&option_sel)
        .filter_map(|opt| opt.value().attr("value"))
        .filter_map(AreaCode::new)
        .collect();

    Ok(codes)
}

// ── Tests ──
