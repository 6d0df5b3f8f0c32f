pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod scraping;
pub mod supabase;
pub mod sync;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use config::{AppConfig, StoreEndpoint};
use db::{EventStore, SqliteStore};
use error::StoreError;
use normalize::{NormalizeContext, NormalizeOutcome};
use scraping::ListingSource;
use supabase::SupabaseStore;
use sync::{SyncReport, SyncStrategy};

/// Fetched, extracted and normalized listings of one run.
#[derive(Debug)]
pub struct Harvest {
    pub extracted: usize,
    pub outcome: NormalizeOutcome,
}

#[derive(Debug)]
pub struct RunSummary {
    pub extracted: usize,
    pub skipped: usize,
    pub block_errors: usize,
    /// `None` when nothing was extracted and the store was left alone.
    pub sync: Option<SyncReport>,
}

impl RunSummary {
    pub fn persisted(&self) -> usize {
        self.sync.as_ref().map(|report| report.persisted).unwrap_or(0)
    }

    pub fn failed(&self) -> usize {
        self.sync.as_ref().map(SyncReport::failed).unwrap_or(0)
    }
}

pub fn open_store(config: &AppConfig) -> Result<Box<dyn EventStore>> {
    let store: Box<dyn EventStore> = match config.endpoint()? {
        StoreEndpoint::Rest(url) => Box::new(SupabaseStore::new(&url, &config.store_key)?),
        StoreEndpoint::Sqlite(path) => Box::new(SqliteStore::open(&path)?),
    };
    Ok(store)
}

/// Connectivity check run before any listing is fetched.
pub fn ensure_store_reachable(store: &dyn EventStore) -> Result<(), StoreError> {
    store.check_connection()
}

pub fn harvest(source: &dyn ListingSource, now: DateTime<Utc>) -> Result<Harvest> {
    info!(source = source.source_id(), "starting scrape");
    let html = source.fetch()?;

    let listings = source.extract(&html);
    info!(candidates = listings.len(), "extracted candidate listings");

    let ctx = NormalizeContext {
        base_url: source.source_url(),
        timezone: source.timezone(),
        now,
    };
    let outcome = normalize::normalize_all(&listings, &ctx);
    info!(
        records = outcome.records.len(),
        skipped = outcome.skipped,
        errors = outcome.errors.len(),
        "normalized listings"
    );

    Ok(Harvest {
        extracted: listings.len(),
        outcome,
    })
}

pub fn run(
    source: &dyn ListingSource,
    store: &dyn EventStore,
    strategy: SyncStrategy,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    let Harvest { extracted, outcome } = harvest(source, now)?;

    let sync = if outcome.records.is_empty() {
        info!("no events found; leaving the store untouched");
        None
    } else {
        let today = now.with_timezone(&source.timezone()).date_naive();
        Some(sync::sync_events(store, &outcome.records, strategy, today))
    };

    Ok(RunSummary {
        extracted,
        skipped: outcome.skipped,
        block_errors: outcome.errors.len(),
        sync,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    use crate::error::FetchError;
    use crate::models::EventType;
    use crate::scraping::aiakce_html::{self, tests::SAMPLE_HTML};
    use crate::scraping::RawListing;

    struct FixtureSource {
        html: &'static str,
    }

    impl ListingSource for FixtureSource {
        fn source_id(&self) -> &'static str {
            "fixture"
        }

        fn source_url(&self) -> &'static str {
            aiakce_html::source_url()
        }

        fn timezone(&self) -> Tz {
            aiakce_html::timezone()
        }

        fn fetch(&self) -> Result<String, FetchError> {
            Ok(self.html.to_string())
        }

        fn extract(&self, html: &str) -> Vec<RawListing> {
            aiakce_html::parse_document(html)
        }
    }

    struct DownSource;

    impl ListingSource for DownSource {
        fn source_id(&self) -> &'static str {
            "down"
        }

        fn source_url(&self) -> &'static str {
            aiakce_html::source_url()
        }

        fn timezone(&self) -> Tz {
            aiakce_html::timezone()
        }

        fn fetch(&self) -> Result<String, FetchError> {
            Err(FetchError::Status {
                url: self.source_url().to_string(),
                status: 503,
            })
        }

        fn extract(&self, _html: &str) -> Vec<RawListing> {
            unreachable!("extract must not run after a failed fetch")
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 18, 10, 0, 0).unwrap()
    }

    #[test]
    fn two_valid_blocks_persist_two_records() {
        let store = SqliteStore::open_in_memory().unwrap();
        let source = FixtureSource { html: SAMPLE_HTML };

        let summary = run(&source, &store, SyncStrategy::ReplaceAll, now()).expect("run");
        assert_eq!(summary.extracted, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.persisted(), 2);
        assert_eq!(summary.failed(), 0);

        let rows = store.list_events().unwrap();
        assert_eq!(rows.len(), 2);

        let conference = &rows[0];
        assert_eq!(conference.title, "AI Konference Praha 2025");
        assert_eq!(conference.event_type, EventType::Conference);
        assert_eq!(conference.city, "Praha");
        assert_eq!(
            conference.event_date,
            chrono::NaiveDate::from_ymd_opt(2025, 11, 5).unwrap()
        );
        assert_eq!(conference.event_time, None);
        assert!(!conference.is_online);

        let webinar = &rows[1];
        assert_eq!(
            webinar.external_url,
            "https://www.aiakce.cz/akce/webinar-llm-v-praxi/"
        );
        assert_eq!(webinar.event_type, EventType::Webinar);
        assert!(webinar.is_online);
        assert_eq!(webinar.city, "Online");
        assert_eq!(webinar.event_time, None);
    }

    #[test]
    fn rerunning_yields_the_same_store_state() {
        for strategy in [SyncStrategy::ReplaceAll, SyncStrategy::Upsert] {
            let store = SqliteStore::open_in_memory().unwrap();
            let source = FixtureSource { html: SAMPLE_HTML };

            run(&source, &store, strategy, now()).expect("first run");
            let first = store.list_events().unwrap();
            let summary = run(&source, &store, strategy, now()).expect("second run");
            let second = store.list_events().unwrap();

            assert_eq!(summary.persisted(), 2, "{strategy}");
            assert_eq!(first, second, "{strategy}");
        }
    }

    #[test]
    fn empty_listing_leaves_store_untouched() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert(&crate::db::tests::record(
                "https://x/kept",
                chrono::NaiveDate::from_ymd_opt(2025, 10, 20).unwrap(),
            ))
            .unwrap();
        let source = FixtureSource {
            html: "<html><body><p>Žádné akce</p></body></html>",
        };

        let summary = run(&source, &store, SyncStrategy::ReplaceAll, now()).expect("run");
        assert!(summary.sync.is_none());
        assert_eq!(summary.persisted(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn fetch_failure_is_fatal_and_carries_status() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = run(&DownSource, &store, SyncStrategy::Upsert, now()).unwrap_err();
        let fetch = err.downcast_ref::<FetchError>().expect("fetch error");
        assert_eq!(fetch.status(), Some(503));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn sqlite_endpoint_opens_local_store() {
        let dir = std::env::temp_dir().join(format!("aiakce-sync-test-{}", std::process::id()));
        let path = dir.join("events.sqlite");
        let config = AppConfig {
            store_url: format!("sqlite:{}", path.display()),
            store_key: "unused".into(),
            strategy: SyncStrategy::Upsert,
        };

        let store = open_store(&config).expect("open store");
        ensure_store_reachable(store.as_ref()).expect("reachable");
        drop(store);
        let _ = std::fs::remove_dir_all(dir);
    }
}
