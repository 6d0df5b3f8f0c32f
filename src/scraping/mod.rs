pub mod aiakce_html;
pub mod base;

use chrono_tz::Tz;

use crate::error::FetchError;

/// Raw field values of one candidate block, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    pub title: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub venue: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: Option<String>,
}

pub trait ListingSource: Send + Sync {
    fn source_id(&self) -> &'static str;
    fn source_url(&self) -> &'static str;
    /// Wall-clock zone the site publishes its dates in.
    fn timezone(&self) -> Tz;
    fn fetch(&self) -> Result<String, FetchError>;
    fn extract(&self, html: &str) -> Vec<RawListing>;
}

pub fn default_source() -> Result<Box<dyn ListingSource>, FetchError> {
    Ok(Box::new(aiakce_html::AiAkce::new()?))
}
