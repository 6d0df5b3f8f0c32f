use chrono::NaiveDate;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Method, Url};

use crate::db::EventStore;
use crate::error::StoreError;
use crate::models::EventRecord;

const TABLE: &str = "events";
const CONFLICT_KEY: &str = "external_url";

/// `events` table behind a Supabase (PostgREST) endpoint.
pub struct SupabaseStore {
    client: Client,
    table_url: Url,
    key: String,
}

impl SupabaseStore {
    pub fn new(endpoint: &Url, key: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::builder().build()?,
            table_url: table_url(endpoint)?,
            key: key.to_string(),
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.key)
            .header(AUTHORIZATION, format!("Bearer {}", self.key))
    }

    fn filtered(&self, pairs: &[(&str, &str)]) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        url
    }

    fn delete_where(&self, column: &str, filter: &str) -> Result<usize, StoreError> {
        let url = self.filtered(&[(column, filter)]);
        let response = send(
            self.request(Method::DELETE, url)
                .header("Prefer", "return=minimal,count=exact"),
        )?;
        Ok(response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .unwrap_or(0))
    }
}

impl EventStore for SupabaseStore {
    fn check_connection(&self) -> Result<(), StoreError> {
        let url = self.filtered(&[("select", CONFLICT_KEY), ("limit", "1")]);
        send(self.request(Method::GET, url))?;
        Ok(())
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        // PostgREST refuses unfiltered deletes; every row has a key.
        self.delete_where(CONFLICT_KEY, "not.is.null")
    }

    fn delete_before(&self, cutoff: NaiveDate) -> Result<usize, StoreError> {
        self.delete_where("event_date", &format!("lt.{}", cutoff.format("%Y-%m-%d")))
    }

    fn insert(&self, record: &EventRecord) -> Result<(), StoreError> {
        send(
            self.request(Method::POST, self.table_url.clone())
                .header("Prefer", "return=minimal")
                .json(record),
        )?;
        Ok(())
    }

    fn upsert(&self, record: &EventRecord) -> Result<(), StoreError> {
        let url = self.filtered(&[("on_conflict", CONFLICT_KEY)]);
        send(
            self.request(Method::POST, url)
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(record),
        )?;
        Ok(())
    }
}

fn send(request: RequestBuilder) -> Result<Response, StoreError> {
    let response = request.send()?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        body,
    })
}

fn table_url(endpoint: &Url) -> Result<Url, StoreError> {
    let mut url = endpoint.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| StoreError::UnsupportedEndpoint(endpoint.to_string()))?
        .pop_if_empty()
        .extend(["rest", "v1", TABLE]);
    Ok(url)
}

/// Total from a `Content-Range` value such as `0-24/25` or `*/3`.
fn parse_content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}
