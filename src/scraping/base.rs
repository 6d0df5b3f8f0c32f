use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use scraper::{ElementRef, Selector};
use tracing::info;

use crate::error::FetchError;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub fn clean_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

/// Prefix of at most `max` characters, never splitting a code point.
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}

pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base_url = reqwest::Url::parse(base).ok()?;
    let joined = base_url.join(href).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}

/// How a matched element is turned into a field value.
#[derive(Debug, Clone, Copy)]
pub enum Read {
    Text,
    Attr(&'static str),
}

impl Read {
    fn value(&self, element: ElementRef<'_>) -> Option<String> {
        let raw = match self {
            Read::Text => inner_text(element),
            Read::Attr(name) => element.value().attr(name).map(clean_text)?,
        };
        if raw.is_empty() {
            None
        } else {
            Some(raw)
        }
    }
}

/// Ordered selector chain for one field; the first non-empty value wins.
pub struct FieldRule {
    selectors: Vec<Selector>,
    read: Read,
}

impl FieldRule {
    pub fn new(selectors: &[&str], read: Read) -> Self {
        let selectors = selectors
            .iter()
            .map(|css| Selector::parse(css).unwrap_or_else(|_| panic!("invalid selector {css}")))
            .collect();
        Self { selectors, read }
    }

    pub fn apply(&self, block: &ElementRef<'_>) -> Option<String> {
        self.selectors.iter().find_map(|selector| {
            block
                .select(selector)
                .next()
                .and_then(|element| self.read.value(element))
        })
    }
}

/// Issues the single listing request with a browser-like header set.
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("cs-CZ,cs;q=0.9,en;q=0.8"),
        );

        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    pub fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        info!(%url, "fetching listing page");
        let network = |source| FetchError::Network {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().map_err(network)?;
        info!(%url, bytes = body.len(), "listing page fetched");
        Ok(body)
    }
}
