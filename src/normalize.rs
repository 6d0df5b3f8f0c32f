//! Turns raw listing fields into typed [`EventRecord`]s.
//!
//! Every listing is handled on its own: a listing without a title or link is
//! skipped, a listing with an unusable link is reported as a
//! [`BlockParseError`], and neither stops the rest of the pass.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::BlockParseError;
use crate::models::{EventRecord, EventType, ONLINE_CITY, UNSPECIFIED};
use crate::scraping::base::{absolute_url, truncate_chars};
use crate::scraping::RawListing;

pub const TITLE_MAX_CHARS: usize = 255;
pub const LOCATION_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
/// Days ahead of today used when a listing has no readable date.
pub const FALLBACK_DATE_OFFSET_DAYS: i64 = 7;

/// Checked in order; the first rule with a keyword found in the title wins.
const TYPE_RULES: &[(&[&str], EventType)] = &[
    (&["konference", "conference"], EventType::Conference),
    (&["workshop"], EventType::Workshop),
    (&["webinář", "webinar"], EventType::Webinar),
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
    "%d. %m. %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d. %m. %Y"];

static ADDRESS_CITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([^,]+)\s*$").expect("valid address city regex"));

pub struct NormalizeContext<'a> {
    /// Page the listings came from; relative links resolve against it.
    pub base_url: &'a str,
    pub timezone: Tz,
    /// Stamped into `updated_at` and used for the date fallback.
    pub now: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub records: Vec<EventRecord>,
    pub skipped: usize,
    pub errors: Vec<BlockParseError>,
}

pub fn normalize_all(listings: &[RawListing], ctx: &NormalizeContext<'_>) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();

    for (index, listing) in listings.iter().enumerate() {
        match normalize(listing, ctx) {
            Ok(Some(record)) => outcome.records.push(record),
            Ok(None) => {
                debug!(index, "skipping listing without title or link");
                outcome.skipped += 1;
            }
            Err(err) => {
                warn!(index, error = %err, "skipping listing");
                outcome.errors.push(err);
            }
        }
    }

    outcome
}

pub fn normalize(
    listing: &RawListing,
    ctx: &NormalizeContext<'_>,
) -> Result<Option<EventRecord>, BlockParseError> {
    let (title, href) = match (non_empty(&listing.title), non_empty(&listing.link)) {
        (Some(title), Some(href)) => (title, href),
        _ => return Ok(None),
    };

    let external_url =
        absolute_url(ctx.base_url, href).ok_or_else(|| BlockParseError::InvalidLink {
            title: title.to_string(),
            href: href.to_string(),
        })?;

    let (event_date, event_time) = match non_empty(&listing.date)
        .and_then(|raw| parse_event_datetime(raw, ctx.timezone))
    {
        Some(parsed) => parsed,
        None => (fallback_date(ctx.now, ctx.timezone), None),
    };

    let venue = non_empty(&listing.venue).unwrap_or_default();
    let address = non_empty(&listing.address).unwrap_or_default();

    let event_type = classify(title);
    let mut city = infer_city(venue, address);
    let is_online = infer_online(venue, address, &city, event_type);
    if city.is_empty() {
        city = if is_online {
            ONLINE_CITY.to_string()
        } else {
            UNSPECIFIED.to_string()
        };
    }

    let location = [venue, address]
        .into_iter()
        .find(|value| !value.is_empty())
        .unwrap_or(UNSPECIFIED);

    Ok(Some(EventRecord {
        title: truncate_chars(title, TITLE_MAX_CHARS),
        event_date,
        event_time,
        location: truncate_chars(location, LOCATION_MAX_CHARS),
        city,
        description: truncate_chars(
            non_empty(&listing.description).unwrap_or_default(),
            DESCRIPTION_MAX_CHARS,
        ),
        external_url,
        image_url: non_empty(&listing.image).map(str::to_string),
        price: non_empty(&listing.price).map(str::to_string),
        event_type,
        is_online,
        updated_at: ctx.now,
    }))
}

/// Calendar date and `HH:MM` wall-clock time in `tz`. A bare date has no time.
pub fn parse_event_datetime(raw: &str, tz: Tz) -> Option<(NaiveDate, Option<String>)> {
    let raw = raw.trim();

    let with_offset = DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z"));
    if let Ok(dt) = with_offset {
        let local = dt.with_timezone(&tz);
        return Some((local.date_naive(), Some(local.format("%H:%M").to_string())));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some((dt.date(), Some(dt.format("%H:%M").to_string())));
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|date| (date, None))
}

/// Listings always get a date; missing ones are placed a week out.
pub fn fallback_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive() + Duration::days(FALLBACK_DATE_OFFSET_DAYS)
}

pub fn classify(title: &str) -> EventType {
    let lower = title.to_lowercase();
    TYPE_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map(|(_, event_type)| *event_type)
        .unwrap_or(EventType::Meetup)
}

/// Venue name before its first comma, else the last segment of the address.
/// Empty when neither gives anything.
pub fn infer_city(venue: &str, address: &str) -> String {
    let from_venue = venue.split(',').next().unwrap_or_default().trim();
    if !from_venue.is_empty() {
        return from_venue.to_string();
    }
    ADDRESS_CITY_RE
        .captures(address)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

pub fn infer_online(venue: &str, address: &str, city: &str, event_type: EventType) -> bool {
    let place = format!("{venue} {address}").to_lowercase();
    place.contains("online")
        || event_type == EventType::Webinar
        || city.to_lowercase() == "online"
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
