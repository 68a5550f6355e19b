//! Ordered key-value store with cursor-based range iteration.
//!
//! Keys are tuples of string parts. Each part is written followed by a NUL
//! byte, so the byte order SQLite uses for BLOB keys matches tuple order and
//! every key under a prefix sorts contiguously after the prefix itself.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::pagination::{Cursor, Page};
use crate::state::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Key parts must not contain NUL bytes")]
    InvalidKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvEntry<T> {
    pub key: Vec<String>,
    pub value: T,
}

pub struct KvStore {
    pool: DbPool,
}

impl KvStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder().max_size(4).build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS kv_entries (
                key   BLOB PRIMARY KEY,
                value TEXT NOT NULL
            ) WITHOUT ROWID;
            ",
        )?;

        tracing::info!("Key-value store opened at {}", path.display());
        Ok(Self { pool })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &[&str]) -> Result<Option<T>, KvError> {
        let encoded = encode_key(key)?;
        let conn = self.pool.get()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![encoded],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &[&str], value: &T) -> Result<(), KvError> {
        let encoded = encode_key(key)?;
        let json = serde_json::to_string(value)?;
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![encoded, json],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &[&str]) -> Result<(), KvError> {
        let encoded = encode_key(key)?;
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![encoded])?;
        Ok(())
    }

    /// Lists entries under `prefix` in key order, one page at a time.
    ///
    /// The returned cursor is the hex-encoded remainder of the last key after
    /// the prefix, or empty once the range is exhausted.
    pub fn list<T: DeserializeOwned>(
        &self,
        prefix: &[&str],
        cursor: &Cursor,
    ) -> Result<Page<KvEntry<T>>, KvError> {
        let prefix_bytes = encode_key(prefix)?;
        let upper = prefix_upper_bound(&prefix_bytes);

        let mut lower = prefix_bytes.clone();
        if !cursor.is_start() {
            let suffix = hex::decode(&cursor.value)
                .map_err(|_| KvError::InvalidCursor(cursor.value.clone()))?;
            lower.extend_from_slice(&suffix);
        }

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT key, value FROM kv_entries
             WHERE key > ?1 AND (?2 IS NULL OR key < ?2)
             ORDER BY key
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![lower, upper, cursor.fetch_limit()], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let page = Page::from_overfetch(rows, cursor, |(key, _)| {
            hex::encode(&key[prefix_bytes.len()..])
        });

        let mut items = Vec::with_capacity(page.items.len());
        for (key, json) in page.items {
            items.push(KvEntry {
                key: decode_key(&key),
                value: serde_json::from_str(&json)?,
            });
        }

        Ok(Page {
            items,
            cursor: page.cursor,
        })
    }
}

fn encode_key(parts: &[&str]) -> Result<Vec<u8>, KvError> {
    let mut encoded = Vec::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for part in parts {
        if part.as_bytes().contains(&0) {
            return Err(KvError::InvalidKey);
        }
        encoded.extend_from_slice(part.as_bytes());
        encoded.push(0);
    }
    Ok(encoded)
}

fn decode_key(encoded: &[u8]) -> Vec<String> {
    let body = encoded.strip_suffix(&[0]).unwrap_or(encoded);
    body.split(|b| *b == 0)
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect()
}

/// Exclusive upper bound of all keys under an encoded prefix. The empty
/// prefix covers the whole table.
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let (last, head) = prefix.split_last()?;
    let mut upper = head.to_vec();
    upper.push(last + 1);
    Some(upper)
}
