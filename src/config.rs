use std::{fmt, path::PathBuf};

use reqwest::Url;

use crate::error::ConfigError;
use crate::sync::SyncStrategy;

pub const STORE_URL_VAR: &str = "SUPABASE_URL";
pub const STORE_KEY_VAR: &str = "SUPABASE_KEY";

const SQLITE_SCHEME: &str = "sqlite:";

/// Settings for one run, validated once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub store_key: String,
    pub strategy: SyncStrategy,
}

/// Where the `events` table lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEndpoint {
    Rest(Url),
    Sqlite(PathBuf),
}

impl AppConfig {
    /// Reads the required settings from the process environment. Call
    /// [`load_dotenv`] first if a `.env` file should be honoured.
    pub fn from_env(strategy: SyncStrategy) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), strategy)
    }

    pub fn from_lookup<F>(lookup: F, strategy: SyncStrategy) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let store_url = required(STORE_URL_VAR)?;
        let store_key = required(STORE_KEY_VAR)?;

        let config = Self {
            store_url,
            store_key,
            strategy,
        };
        config.endpoint()?;
        Ok(config)
    }

    pub fn endpoint(&self) -> Result<StoreEndpoint, ConfigError> {
        if let Some(path) = self.store_url.strip_prefix(SQLITE_SCHEME) {
            let path = path.trim_start_matches("//");
            if path.is_empty() {
                return Err(ConfigError::Invalid {
                    name: STORE_URL_VAR,
                    reason: "sqlite endpoint needs a file path".into(),
                });
            }
            return Ok(StoreEndpoint::Sqlite(PathBuf::from(path)));
        }

        let url = Url::parse(&self.store_url).map_err(|err| ConfigError::Invalid {
            name: STORE_URL_VAR,
            reason: err.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(StoreEndpoint::Rest(url)),
            other => Err(ConfigError::Invalid {
                name: STORE_URL_VAR,
                reason: format!("unsupported scheme {other:?}"),
            }),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("store_url", &self.store_url)
            .field("store_key", &"<redacted>")
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Loads `.env` if present (development). A missing file is not an error.
pub fn load_dotenv() -> Result<(), dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(err),
    }
}
