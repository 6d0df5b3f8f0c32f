use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};

use crate::error::StoreError;
use crate::models::{EventRecord, EventType};

/// Operations the sync writer needs from the `events` table. Each call is
/// atomic on its own; nothing spans calls.
pub trait EventStore {
    /// Cheap round trip proving the store is reachable.
    fn check_connection(&self) -> Result<(), StoreError>;
    fn delete_all(&self) -> Result<usize, StoreError>;
    /// Removes rows whose `event_date` is strictly before `cutoff`.
    fn delete_before(&self, cutoff: NaiveDate) -> Result<usize, StoreError>;
    fn insert(&self, record: &EventRecord) -> Result<(), StoreError>;
    /// Insert, or overwrite the row with the same `external_url`.
    fn upsert(&self, record: &EventRecord) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(err) = std::fs::create_dir_all(parent) {
                    tracing::warn!(path = %parent.display(), error = %err, "failed to create database directory");
                }
            }
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events(
                external_url TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                event_date TEXT NOT NULL,
                event_time TEXT,
                location TEXT NOT NULL,
                city TEXT NOT NULL,
                description TEXT NOT NULL,
                image_url TEXT,
                price TEXT,
                event_type TEXT NOT NULL,
                is_online INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS events_event_date ON events(event_date);",
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn list_events(&self) -> Result<Vec<EventRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT external_url, title, event_date, event_time, location, city, description,
                    image_url, price, event_type, is_online, updated_at
             FROM events ORDER BY event_date, external_url",
        )?;
        let rows = stmt.query_map([], record_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn write(&self, sql: &str, record: &EventRecord) -> Result<(), StoreError> {
        self.conn.execute(
            sql,
            params![
                record.external_url,
                record.title,
                record.event_date,
                record.event_time,
                record.location,
                record.city,
                record.description,
                record.image_url,
                record.price,
                record.event_type.as_str(),
                record.is_online,
                record.updated_at,
            ],
        )?;
        Ok(())
    }
}

const INSERT_SQL: &str = "INSERT INTO events (external_url, title, event_date, event_time, location, city,
        description, image_url, price, event_type, is_online, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

const UPSERT_SQL: &str = "INSERT INTO events (external_url, title, event_date, event_time, location, city,
        description, image_url, price, event_type, is_online, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
     ON CONFLICT(external_url) DO UPDATE SET
       title = excluded.title,
       event_date = excluded.event_date,
       event_time = excluded.event_time,
       location = excluded.location,
       city = excluded.city,
       description = excluded.description,
       image_url = excluded.image_url,
       price = excluded.price,
       event_type = excluded.event_type,
       is_online = excluded.is_online,
       updated_at = excluded.updated_at";

impl EventStore for SqliteStore {
    fn check_connection(&self) -> Result<(), StoreError> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        Ok(self.conn.execute("DELETE FROM events", [])?)
    }

    fn delete_before(&self, cutoff: NaiveDate) -> Result<usize, StoreError> {
        Ok(self
            .conn
            .execute("DELETE FROM events WHERE event_date < ?1", params![cutoff])?)
    }

    fn insert(&self, record: &EventRecord) -> Result<(), StoreError> {
        self.write(INSERT_SQL, record)
    }

    fn upsert(&self, record: &EventRecord) -> Result<(), StoreError> {
        self.write(UPSERT_SQL, record)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    let event_type: String = row.get(9)?;
    let event_type = EventType::from_db(&event_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            rusqlite::types::Type::Text,
            format!("unknown event type {event_type:?}").into(),
        )
    })?;
    let event_date: NaiveDate = row.get(2)?;
    let updated_at: DateTime<Utc> = row.get(11)?;

    Ok(EventRecord {
        external_url: row.get(0)?,
        title: row.get(1)?,
        event_date,
        event_time: row.get(3)?,
        location: row.get(4)?,
        city: row.get(5)?,
        description: row.get(6)?,
        image_url: row.get(7)?,
        price: row.get(8)?,
        event_type,
        is_online: row.get(10)?,
        updated_at,
    })
}
