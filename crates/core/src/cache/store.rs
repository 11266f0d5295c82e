//! Entry operations within a single named store.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use crate::exchange::{Request, Response, parse_http_date};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Identity of a cached request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    /// Storage hash for this identity.
    pub fn hash(&self) -> String {
        compute_request_key(&self.method, &self.url)
    }
}

/// Freshness of one entry, read without loading its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStamp {
    pub key: CacheKey,
    /// Bumped by every `put` under the same key.
    pub revision: i64,
    /// Parsed `date` header of the stored response, if any.
    pub date: Option<DateTime<Utc>>,
}

/// Handle to one named store.
#[derive(Clone, Debug)]
pub struct Store {
    db: CacheDb,
    name: String,
}

impl Store {
    pub(crate) fn new(db: CacheDb, name: &str) -> Self {
        Self { db, name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a response under the request's identity, replacing any previous
    /// entry. Creates the store if it was deleted in the meantime.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for non-GET requests.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!(
                "only GET requests can be cached, got {}",
                request.method
            )));
        }

        let key = request.cache_key();
        let key_hash = key.hash();
        let store = self.name.clone();
        let status = response.status.as_u16();
        let headers_json = serde_json::to_string(&response.header_pairs())?;
        let body = response.body.to_vec();
        let stored_at = Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![store, stored_at],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (store, key_hash, method, url, status, headers_json, body, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(store, key_hash) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at,
                        revision = cache_entries.revision + 1",
                    params![store, key_hash, key.method, key.url, status, headers_json, body, stored_at],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the response stored for this request.
    ///
    /// Non-GET requests never match.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        self.match_key(&request.cache_key()).await
    }

    /// Whether a response is stored for this request, without loading it.
    pub async fn contains(&self, request: &Request) -> Result<bool, Error> {
        if !request.is_get() {
            return Ok(false);
        }
        let store = self.name.clone();
        let key_hash = request.cache_key().hash();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let found = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_entries WHERE store = ?1 AND key_hash = ?2)",
                    params![store, key_hash],
                    |row| row.get(0),
                )?;
                Ok(found)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the response stored under a key.
    pub async fn match_key(&self, key: &CacheKey) -> Result<Option<Response>, Error> {
        let store = self.name.clone();
        let key_hash = key.hash();
        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<(u16, String, Vec<u8>)>, Error> {
                let mut stmt =
                    conn.prepare("SELECT status, headers_json, body FROM cache_entries WHERE store = ?1 AND key_hash = ?2")?;

                let result = stmt.query_row(params![store, key_hash], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)));

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        match row {
            Some((status, headers_json, body)) => {
                let pairs: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                Response::from_parts(status, pairs, body).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Delete the entry stored under a key.
    ///
    /// Returns false if there was nothing to delete.
    pub async fn delete(&self, key: &CacheKey) -> Result<bool, Error> {
        let store = self.name.clone();
        let key_hash = key.hash();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE store = ?1 AND key_hash = ?2",
                    params![store, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete an entry only if it has not been overwritten since `stamp` was
    /// read.
    ///
    /// Returns false if the entry is gone or a newer `put` replaced it.
    pub async fn delete_if_unchanged(&self, stamp: &EntryStamp) -> Result<bool, Error> {
        let store = self.name.clone();
        let key_hash = stamp.key.hash();
        let revision = stamp.revision;
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE store = ?1 AND key_hash = ?2 AND revision = ?3",
                    params![store, key_hash, revision],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Key, revision and response date of every entry, in insertion order.
    pub async fn stamps(&self) -> Result<Vec<EntryStamp>, Error> {
        let store = self.name.clone();
        let rows = self
            .db
            .conn
            .call(move |conn| -> Result<Vec<(CacheKey, i64, String)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, revision, headers_json FROM cache_entries WHERE store = ?1 ORDER BY rowid ASC",
                )?;
                let rows = stmt
                    .query_map(params![store], |row| {
                        Ok((CacheKey { method: row.get(0)?, url: row.get(1)? }, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(key, revision, headers_json)| {
                let pairs: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                let date = pairs
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case("date"))
                    .and_then(|(_, value)| parse_http_date(value));
                Ok(EntryStamp { key, revision, date })
            })
            .collect()
    }

    /// Every key in the store, in insertion order.
    pub async fn keys(&self) -> Result<Vec<CacheKey>, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<CacheKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM cache_entries WHERE store = ?1 ORDER BY rowid ASC")?;
                let keys = stmt
                    .query_map(params![store], |row| Ok(CacheKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in the store.
    pub async fn count(&self) -> Result<u64, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
