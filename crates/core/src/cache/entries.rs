//! Entry storage: put and match within a generation.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheStore;
use super::generations::Generation;
use super::key::RequestKey;
use crate::Error;

/// A stored response body plus the metadata needed to serve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: String,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl CacheStore {
    /// Store a response under `key`, replacing any previous entry.
    ///
    /// Only successful responses are cacheable; a non-2xx response is
    /// logged and the call returns without touching the store. Writing the
    /// same key twice is an idempotent upsert, so concurrent write-through
    /// of the same fetch is harmless.
    pub async fn put(
        &self, generation: &Generation, key: &RequestKey, response: &CachedResponse,
    ) -> Result<(), Error> {
        if !response.is_success() {
            tracing::debug!(url = %key.url, status = response.status, "skipping cache write of non-success response");
            return Ok(());
        }

        let name = generation.name().to_string();
        let key = key.clone();
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                        generation, fingerprint, fingerprint_bare, method, url,
                        status, content_type, headers_json, body, fetched_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(generation, fingerprint) DO UPDATE SET
                        fingerprint_bare = excluded.fingerprint_bare,
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        content_type = excluded.content_type,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        fetched_at = excluded.fetched_at",
                    params![
                        name,
                        key.fingerprint,
                        key.fingerprint_bare,
                        key.method,
                        key.url,
                        response.status,
                        response.content_type,
                        response.headers_json,
                        response.body,
                        response.fetched_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by key. Absence is `None`, not an error.
    ///
    /// With `ignore_query` the lookup matches on the query-stripped
    /// fingerprint, preferring the most recently fetched candidate.
    pub async fn match_entry(
        &self, generation: &Generation, key: &RequestKey, ignore_query: bool,
    ) -> Result<Option<CachedResponse>, Error> {
        let name = generation.name().to_string();
        let fingerprint = if ignore_query { key.fingerprint_bare.clone() } else { key.fingerprint.clone() };
        let column = if ignore_query { "fingerprint_bare" } else { "fingerprint" };
        let sql = format!(
            "SELECT url, status, content_type, headers_json, body, fetched_at
             FROM entries WHERE generation = ?1 AND {column} = ?2
             ORDER BY fetched_at DESC LIMIT 1"
        );
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let result = stmt.query_row(params![name, fingerprint], |row| {
                    Ok(CachedResponse {
                        url: row.get(0)?,
                        status: row.get(1)?,
                        content_type: row.get(2)?,
                        headers_json: row.get(3)?,
                        body: row.get(4)?,
                        fetched_at: row.get(5)?,
                    })
                });
                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a generation.
    pub async fn count_entries(&self, generation: &Generation) -> Result<u64, Error> {
        let name = generation.name().to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE generation = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
