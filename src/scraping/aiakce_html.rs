use chrono_tz::Tz;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::base::{self, FieldRule, PageFetcher, Read};
use super::{ListingSource, RawListing};
use crate::error::FetchError;

const URL: &str = "https://www.aiakce.cz/seznam/";
const SOURCE_ID: &str = "aiakce";
const TIMEZONE: Tz = chrono_tz::Europe::Prague;

/// Row selectors in priority order; the first one that matches anything is used.
static ROW_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        ".tribe-events-calendar-list__event-row",
        "article.tribe-events-calendar-list__event",
    ]
    .iter()
    .map(|css| Selector::parse(css).expect("aiakce row selector"))
    .collect()
});
static OUTBOUND_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="http"]"#).expect("aiakce outbound link selector"));

static TITLE_RULE: Lazy<FieldRule> = Lazy::new(|| {
    FieldRule::new(
        &[
            ".tribe-events-calendar-list__event-title-link",
            ".tribe-events-calendar-list__event-title a",
        ],
        Read::Text,
    )
});
static LINK_RULE: Lazy<FieldRule> = Lazy::new(|| {
    FieldRule::new(
        &[
            ".tribe-events-calendar-list__event-title-link",
            ".tribe-events-calendar-list__event-title a",
        ],
        Read::Attr("href"),
    )
});
const DATE_SELECTORS: &[&str] = &[
    ".tribe-event-date-start",
    ".tribe-events-calendar-list__event-date-tag-datetime",
];
// The machine-readable attribute is searched across every date selector
// before any rendered text is taken.
static DATE_ATTR_RULE: Lazy<FieldRule> =
    Lazy::new(|| FieldRule::new(DATE_SELECTORS, Read::Attr("datetime")));
static DATE_TEXT_RULE: Lazy<FieldRule> = Lazy::new(|| FieldRule::new(DATE_SELECTORS, Read::Text));
static VENUE_RULE: Lazy<FieldRule> = Lazy::new(|| {
    FieldRule::new(
        &[
            ".tribe-events-calendar-list__event-venue-title",
            ".tribe-venue",
        ],
        Read::Text,
    )
});
static ADDRESS_RULE: Lazy<FieldRule> = Lazy::new(|| {
    FieldRule::new(
        &[
            ".tribe-events-calendar-list__event-venue-address",
            ".tribe-address",
        ],
        Read::Text,
    )
});
static DESCRIPTION_RULE: Lazy<FieldRule> = Lazy::new(|| {
    FieldRule::new(
        &[
            ".tribe-events-calendar-list__event-description",
            ".tribe-events-list-event-description",
        ],
        Read::Text,
    )
});
static IMAGE_RULE: Lazy<FieldRule> = Lazy::new(|| {
    FieldRule::new(
        &[
            ".tribe-events-calendar-list__event-featured-image img",
            "img.tribe-events-calendar-list__event-featured-image",
        ],
        Read::Attr("src"),
    )
});
static PRICE_RULE: Lazy<FieldRule> = Lazy::new(|| {
    FieldRule::new(
        &[".tribe-events-c-small-cta__price", ".tribe-events-cost"],
        Read::Text,
    )
});

pub struct AiAkce {
    fetcher: PageFetcher,
}

impl AiAkce {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            fetcher: PageFetcher::new()?,
        })
    }
}

impl ListingSource for AiAkce {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn source_url(&self) -> &'static str {
        URL
    }

    fn timezone(&self) -> Tz {
        TIMEZONE
    }

    fn fetch(&self) -> Result<String, FetchError> {
        self.fetcher.fetch_html(URL)
    }

    fn extract(&self, html: &str) -> Vec<RawListing> {
        parse_document(html)
    }
}

pub fn source_url() -> &'static str {
    URL
}

pub fn timezone() -> Tz {
    TIMEZONE
}

pub fn parse_document(html: &str) -> Vec<RawListing> {
    let document = Html::parse_document(html);

    for (index, selector) in ROW_SELECTORS.iter().enumerate() {
        let rows: Vec<ElementRef<'_>> = document.select(selector).collect();
        if rows.is_empty() {
            continue;
        }
        info!(rows = rows.len(), selector = index, "found candidate event rows");
        return rows.iter().map(read_row).collect();
    }

    let outbound = document.select(&OUTBOUND_LINK_SELECTOR).count();
    warn!(
        outbound_links = outbound,
        "no event rows matched; the listing markup may have changed"
    );
    Vec::new()
}

fn read_row(row: &ElementRef<'_>) -> RawListing {
    let listing = RawListing {
        title: TITLE_RULE.apply(row),
        link: LINK_RULE.apply(row),
        date: DATE_ATTR_RULE
            .apply(row)
            .or_else(|| DATE_TEXT_RULE.apply(row)),
        venue: VENUE_RULE.apply(row),
        address: ADDRESS_RULE.apply(row),
        description: DESCRIPTION_RULE.apply(row),
        image: IMAGE_RULE
            .apply(row)
            .and_then(|src| base::absolute_url(URL, &src)),
        price: PRICE_RULE.apply(row),
    };
    debug!(title = ?listing.title, link = ?listing.link, "read candidate row");
    listing
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_HTML: &str = r#"
    <html><body>
    <div class="tribe-events-calendar-list">
        <div class="tribe-events-calendar-list__event-row">
            <div class="tribe-events-calendar-list__event-date-tag">
                <time class="tribe-events-calendar-list__event-date-tag-datetime" datetime="2025-11-05">
                    <span>5</span><span>lis</span>
                </time>
            </div>
            <div class="tribe-events-calendar-list__event-wrapper">
                <article class="tribe-events-calendar-list__event">
                    <div class="tribe-events-calendar-list__event-featured-image-wrapper">
                        <a href="https://www.aiakce.cz/akce/ai-konference-praha/" class="tribe-events-calendar-list__event-featured-image-link">
                            <img src="/wp-content/uploads/2025/09/konference.jpg" class="tribe-events-calendar-list__event-featured-image" alt="">
                        </a>
                    </div>
                    <div class="tribe-events-calendar-list__event-details">
                        <header>
                            <div class="tribe-events-calendar-list__event-datetime-wrapper">
                                <time class="tribe-events-calendar-list__event-datetime" datetime="2025-11-05">
                                    <span class="tribe-event-date-start">5. listopadu @ 9:00</span>
                                </time>
                            </div>
                            <h3 class="tribe-events-calendar-list__event-title">
                                <a href="https://www.aiakce.cz/akce/ai-konference-praha/" class="tribe-events-calendar-list__event-title-link">
                                    AI Konference Praha 2025
                                </a>
                            </h3>
                            <address class="tribe-events-calendar-list__event-venue">
                                <span class="tribe-events-calendar-list__event-venue-title">Praha, Kongresové centrum</span>
                                <span class="tribe-events-calendar-list__event-venue-address">5. května 65, Praha 4</span>
                            </address>
                        </header>
                        <div class="tribe-events-calendar-list__event-description">
                            <p>Největší česká konference o umělé inteligenci.</p>
                        </div>
                        <div class="tribe-events-c-small-cta">
                            <span class="tribe-events-c-small-cta__price">1 990 Kč</span>
                        </div>
                    </div>
                </article>
            </div>
        </div>
        <div class="tribe-events-calendar-list__event-row">
            <div class="tribe-events-calendar-list__event-date-tag">
                <time class="tribe-events-calendar-list__event-date-tag-datetime" datetime="2025-11-12">
                    <span>12</span>
                </time>
            </div>
            <article class="tribe-events-calendar-list__event">
                <h3 class="tribe-events-calendar-list__event-title">
                    <a href="/akce/webinar-llm-v-praxi/">Webinář: LLM v praxi</a>
                </h3>
                <div class="tribe-events-calendar-list__event-description">Online přednáška.</div>
            </article>
        </div>
        <div class="tribe-events-calendar-list__event-row">
            <article class="tribe-events-calendar-list__event">
                <h3 class="tribe-events-calendar-list__event-title"></h3>
                <span class="tribe-events-calendar-list__event-venue-title">Brno</span>
            </article>
        </div>
    </div>
    <a href="https://www.facebook.com/aiakce">Facebook</a>
    </body></html>
    "#;

    #[test]
    fn parses_primary_rows() {
        let listings = parse_document(SAMPLE_HTML);
        assert_eq!(listings.len(), 3);

        let first = &listings[0];
        assert_eq!(first.title.as_deref(), Some("AI Konference Praha 2025"));
        assert_eq!(
            first.link.as_deref(),
            Some("https://www.aiakce.cz/akce/ai-konference-praha/")
        );
        assert_eq!(first.date.as_deref(), Some("2025-11-05"));
        assert_eq!(first.venue.as_deref(), Some("Praha, Kongresové centrum"));
        assert_eq!(first.address.as_deref(), Some("5. května 65, Praha 4"));
        assert_eq!(
            first.description.as_deref(),
            Some("Největší česká konference o umělé inteligenci.")
        );
        assert_eq!(
            first.image.as_deref(),
            Some("https://www.aiakce.cz/wp-content/uploads/2025/09/konference.jpg")
        );
        assert_eq!(first.price.as_deref(), Some("1 990 Kč"));
    }

    #[test]
    fn uses_secondary_selectors_when_primary_missing() {
        let listings = parse_document(SAMPLE_HTML);
        let second = &listings[1];
        assert_eq!(second.title.as_deref(), Some("Webinář: LLM v praxi"));
        assert_eq!(second.link.as_deref(), Some("/akce/webinar-llm-v-praxi/"));
        assert_eq!(second.date.as_deref(), Some("2025-11-12"));
        assert_eq!(second.venue, None);
        assert_eq!(second.image, None);
        assert_eq!(second.price, None);
    }

    #[test]
    fn keeps_blocks_without_title_for_the_normalizer_to_gate() {
        let listings = parse_document(SAMPLE_HTML);
        let third = &listings[2];
        assert_eq!(third.title, None);
        assert_eq!(third.link, None);
        assert_eq!(third.venue.as_deref(), Some("Brno"));
    }

    #[test]
    fn date_attribute_wins_over_rendered_start_text() {
        let html = r#"
        <div class="tribe-events-calendar-list__event-row">
            <time class="tribe-events-calendar-list__event-date-tag-datetime" datetime="2025-11-05">
                <span>5</span><span>lis</span>
            </time>
            <span class="tribe-event-date-start">5. listopadu @ 9:00</span>
            <a class="tribe-events-calendar-list__event-title-link" href="/akce/ai-den/">AI den</a>
        </div>
        "#;
        let listings = parse_document(html);
        assert_eq!(listings[0].date.as_deref(), Some("2025-11-05"));
    }

    #[test]
    fn date_text_is_used_when_no_selector_has_the_attribute() {
        let html = r#"
        <div class="tribe-events-calendar-list__event-row">
            <span class="tribe-event-date-start">5.11.2025 9:00</span>
        </div>
        "#;
        let listings = parse_document(html);
        assert_eq!(listings[0].date.as_deref(), Some("5.11.2025 9:00"));
    }

    #[test]
    fn inline_markup_does_not_split_words() {
        let html = r#"
        <div class="tribe-events-calendar-list__event-row">
            <a class="tribe-events-calendar-list__event-title-link" href="/akce/x/">AI <em>Meetup</em>: Praha</a>
            <div class="tribe-events-calendar-list__event-description"><p>Více na <a href="/x">webu</a>.</p></div>
        </div>
        "#;
        let listings = parse_document(html);
        assert_eq!(listings[0].title.as_deref(), Some("AI Meetup: Praha"));
        assert_eq!(listings[0].description.as_deref(), Some("Více na webu."));
    }

    #[test]
    fn falls_back_to_article_rows() {
        let html = r#"
        <article class="tribe-events-calendar-list__event">
            <h3 class="tribe-events-calendar-list__event-title">
                <a class="tribe-events-calendar-list__event-title-link" href="https://www.aiakce.cz/akce/meetup/">AI Meetup Brno</a>
            </h3>
        </article>
        "#;
        let listings = parse_document(html);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title.as_deref(), Some("AI Meetup Brno"));
    }

    #[test]
    fn unrelated_markup_yields_nothing() {
        let html = r#"<html><body><a href="https://example.com">x</a></body></html>"#;
        assert!(parse_document(html).is_empty());
    }
}
