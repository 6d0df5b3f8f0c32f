use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder stored when the listing carries no venue or city.
pub const UNSPECIFIED: &str = "unspecified";
/// City stored for online events that carry no other locality.
pub const ONLINE_CITY: &str = "Online";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Conference,
    Workshop,
    Webinar,
    Meetup,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Conference => "conference",
            EventType::Workshop => "workshop",
            EventType::Webinar => "webinar",
            EventType::Meetup => "meetup",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "conference" => Some(EventType::Conference),
            "workshop" => Some(EventType::Workshop),
            "webinar" => Some(EventType::Webinar),
            "meetup" => Some(EventType::Meetup),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `events` table. `external_url` is the identity key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub title: String,
    pub event_date: NaiveDate,
    pub event_time: Option<String>, // HH:MM, site-local
    pub location: String,
    pub city: String,
    pub description: String,
    pub external_url: String,
    pub image_url: Option<String>,
    pub price: Option<String>,
    pub event_type: EventType,
    pub is_online: bool,
    pub updated_at: DateTime<Utc>,
}
