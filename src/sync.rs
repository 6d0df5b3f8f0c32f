//! Writes one run's records into the store.
//!
//! Two replacement strategies exist and the caller picks one:
//!
//! * [`SyncStrategy::ReplaceAll`] deletes every row, then inserts each
//!   record. A crash between the phases leaves the table empty.
//! * [`SyncStrategy::Upsert`] deletes rows dated before yesterday, then
//!   upserts each record on `external_url`. A crash between the phases leaves
//!   the previous rows in place. Rows that vanished from the listing but are
//!   still in the future stay until their date passes.
//!
//! In both, a failed delete is logged and the write phase still runs, and a
//! failed write is counted without stopping the batch. Nothing spans a
//! transaction.

use std::fmt;

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;
use tracing::{info, warn};

use crate::db::EventStore;
use crate::error::StoreError;
use crate::models::EventRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncStrategy {
    /// Delete everything, then insert each record.
    ReplaceAll,
    /// Prune rows before yesterday, then upsert on `external_url`.
    Upsert,
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStrategy::ReplaceAll => f.write_str("replace-all"),
            SyncStrategy::Upsert => f.write_str("upsert"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub deleted: Option<usize>,
    /// Set when the delete phase failed; the write phase ran anyway.
    pub delete_error: Option<String>,
    pub persisted: usize,
    pub failures: Vec<WriteFailure>,
}

#[derive(Debug)]
pub struct WriteFailure {
    pub external_url: String,
    pub error: StoreError,
}

impl SyncReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// `today` is the site-local calendar date of the run.
pub fn sync_events(
    store: &dyn EventStore,
    records: &[EventRecord],
    strategy: SyncStrategy,
    today: NaiveDate,
) -> SyncReport {
    let mut report = SyncReport::default();

    let deleted = match strategy {
        SyncStrategy::ReplaceAll => store.delete_all(),
        SyncStrategy::Upsert => store.delete_before(today - Duration::days(1)),
    };
    match deleted {
        Ok(count) => {
            info!(%strategy, deleted = count, "cleared previous events");
            report.deleted = Some(count);
        }
        Err(err) => {
            warn!(%strategy, error = %err, "failed to clear previous events; continuing");
            report.delete_error = Some(err.to_string());
        }
    }

    for record in records {
        let written = match strategy {
            SyncStrategy::ReplaceAll => store.insert(record),
            SyncStrategy::Upsert => store.upsert(record),
        };
        match written {
            Ok(()) => {
                info!(url = %record.external_url, title = %record.title, "saved event");
                report.persisted += 1;
            }
            Err(error) => {
                warn!(url = %record.external_url, error = %error, "failed to save event");
                report.failures.push(WriteFailure {
                    external_url: record.external_url.clone(),
                    error,
                });
            }
        }
    }

    info!(
        persisted = report.persisted,
        failed = report.failed(),
        "sync finished"
    );
    report
}
