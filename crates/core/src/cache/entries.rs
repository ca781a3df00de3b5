//! Generation and entry operations on the SQLite cache.
//!
//! Entries belong to exactly one generation; deleting the generation row
//! cascades to its entries.

use super::connection::CacheDb;
use super::hash::{compute_cache_key, request_key, request_url};
use crate::{Error, ResourceRequest, ResourceResponse};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, Transaction};

/// Listing view of a stored entry, without its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryMeta {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub kind: String,
    pub content_type: Option<String>,
    pub body_len: usize,
    pub stored_at: String,
}

/// Columns as read back from the entries table.
struct EntryRow {
    url: String,
    status: u16,
    kind: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn into_response(self) -> Result<ResourceResponse, Error> {
        let headers: Vec<(String, String)> =
            serde_json::from_str(&self.headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(ResourceResponse {
            url: self.url,
            status: self.status,
            kind: self.kind.parse()?,
            headers,
            body: Bytes::from(self.body),
        })
    }
}

/// Owned form of a put, so it can move onto the database thread.
struct PendingEntry {
    cache_key: String,
    method: String,
    url: String,
    status: u16,
    kind: &'static str,
    headers_json: String,
    body: Vec<u8>,
}

impl PendingEntry {
    fn new(request: &ResourceRequest, response: &ResourceResponse) -> Result<Self, Error> {
        let headers_json = serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        Ok(Self {
            cache_key: request_key(request),
            method: request.method.clone(),
            url: request_url(request),
            status: response.status,
            kind: response.kind.as_str(),
            headers_json,
            body: response.body.to_vec(),
        })
    }
}

fn ensure_generation(tx: &Transaction<'_>, generation: &str, now: &str) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
        params![generation, now],
    )?;
    Ok(())
}

fn generation_exists(tx: &Transaction<'_>, generation: &str) -> Result<bool, rusqlite::Error> {
    tx.query_row("SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)", params![generation], |row| row.get(0))
}

fn insert_entry(tx: &Transaction<'_>, generation: &str, entry: &PendingEntry, now: &str) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO entries (
            generation, cache_key, method, url, status, kind, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(generation, cache_key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            kind = excluded.kind,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            &entry.cache_key,
            &entry.method,
            &entry.url,
            entry.status,
            entry.kind,
            &entry.headers_json,
            &entry.body,
            now,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Create the generation if it does not exist yet.
    pub async fn open_generation(&self, generation: &str) -> Result<(), Error> {
        let generation = generation.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![generation, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All generation names, oldest first.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if no such generation existed.
    pub async fn delete_generation(&self, generation: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![generation])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by cache key within a generation.
    pub async fn get_entry(&self, generation: &str, cache_key: &str) -> Result<Option<ResourceResponse>, Error> {
        let generation = generation.to_string();
        let cache_key = cache_key.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let row = conn
                    .query_row(
                        "SELECT url, status, kind, headers_json, body
                         FROM entries WHERE generation = ?1 AND cache_key = ?2",
                        params![generation, cache_key],
                        |row| {
                            Ok(EntryRow {
                                url: row.get(0)?,
                                status: row.get(1)?,
                                kind: row.get(2)?,
                                headers_json: row.get(3)?,
                                body: row.get(4)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    /// Look up the entry for a GET of `url` within a generation.
    pub async fn get_entry_by_url(&self, generation: &str, url: &str) -> Result<Option<ResourceResponse>, Error> {
        self.get_entry(generation, &compute_cache_key("GET", url)).await
    }

    /// Store one entry in an existing generation.
    ///
    /// Overwrites any prior entry for the same request. Returns `false`
    /// without writing when the generation does not exist, so a late write
    /// from a superseded worker cannot bring a deleted generation back.
    pub async fn put_entry(
        &self, generation: &str, request: &ResourceRequest, response: &ResourceResponse,
    ) -> Result<bool, Error> {
        let generation = generation.to_string();
        let entry = PendingEntry::new(request, response)?;
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                if !generation_exists(&tx, &generation)? {
                    return Ok(false);
                }
                insert_entry(&tx, &generation, &entry, &now)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Store several entries in one transaction, creating the generation if
    /// needed: all of them land or none do.
    pub async fn put_entries(
        &self, generation: &str, entries: &[(ResourceRequest, ResourceResponse)],
    ) -> Result<(), Error> {
        let generation = generation.to_string();
        let pending = entries
            .iter()
            .map(|(request, response)| PendingEntry::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_generation(&tx, &generation, &now)?;
                for entry in &pending {
                    insert_entry(&tx, &generation, entry, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// List entries of a generation, ordered by URL.
    pub async fn list_entries(&self, generation: &str) -> Result<Vec<EntryMeta>, Error> {
        let generation = generation.to_string();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(EntryMeta, String)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, kind, length(body), stored_at, headers_json
                     FROM entries WHERE generation = ?1 ORDER BY url ASC",
                )?;
                let rows = stmt
                    .query_map(params![generation], |row| {
                        Ok((
                            EntryMeta {
                                method: row.get(0)?,
                                url: row.get(1)?,
                                status: row.get(2)?,
                                kind: row.get(3)?,
                                content_type: None,
                                body_len: row.get::<_, i64>(4)? as usize,
                                stored_at: row.get(5)?,
                            },
                            row.get::<_, String>(6)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(mut meta, headers_json)| {
                let headers: Vec<(String, String)> =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
                meta.content_type = headers
                    .into_iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                    .map(|(_, v)| v);
                Ok(meta)
            })
            .collect()
    }
}
