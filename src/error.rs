use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unable to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request failed for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("non-success status {status} for {url}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A single listing that could not be turned into a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockParseError {
    #[error("listing {title:?} has an unusable link {href:?}")]
    InvalidLink { title: String, href: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store api error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported store endpoint: {0}")]
    UnsupportedEndpoint(String),
}
