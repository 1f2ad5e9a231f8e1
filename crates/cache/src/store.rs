// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed store for blob metadata and payloads.
//!
//! Two tables: `blob_meta` holds the bookkeeping row, `blob_data` holds the
//! bytes. Every write or delete pairs the two inside one transaction, so a
//! crash or concurrent read never observes metadata without its payload or
//! vice versa.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use rq_core::error::{Error, Result};

use crate::meta::{BlobMeta, DownloadStatus};

/// SQL schema for the blob cache database.
pub const SCHEMA: &str = r#"
-- Bookkeeping row per cached blob
CREATE TABLE IF NOT EXISTS blob_meta (
    conversation_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    mime_type TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL,
    last_accessed_ms INTEGER NOT NULL,
    content_hash TEXT,
    verified INTEGER NOT NULL DEFAULT 0,
    pinned INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    priority INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (conversation_id, filename)
);

-- Payload bytes, always written/deleted in the same transaction as the
-- matching blob_meta row
CREATE TABLE IF NOT EXISTS blob_data (
    conversation_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    bytes BLOB NOT NULL,
    PRIMARY KEY (conversation_id, filename)
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_blob_meta_conversation ON blob_meta(conversation_id);
CREATE INDEX IF NOT EXISTS idx_blob_meta_last_accessed ON blob_meta(last_accessed_ms);
CREATE INDEX IF NOT EXISTS idx_blob_meta_pinned ON blob_meta(pinned);
"#;

/// Parse a stored status string, returning a rusqlite error on failure.
fn parse_status(value: &str) -> std::result::Result<DownloadStatus, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid download status '{value}' in column 'status'"
            ))),
        )
    })
}

fn row_to_meta(row: &rusqlite::Row<'_>) -> std::result::Result<BlobMeta, rusqlite::Error> {
    let status: String = row.get("status")?;
    Ok(BlobMeta {
        conversation_id: row.get("conversation_id")?,
        filename: row.get("filename")?,
        size: row.get::<_, i64>("size")? as u64,
        mime_type: row.get("mime_type")?,
        created_at_ms: row.get::<_, i64>("created_at_ms")? as u64,
        last_accessed_ms: row.get::<_, i64>("last_accessed_ms")? as u64,
        content_hash: row.get("content_hash")?,
        verified: row.get("verified")?,
        pinned: row.get("pinned")?,
        status: parse_status(&status)?,
        priority: row.get("priority")?,
    })
}

const META_COLUMNS: &str = "conversation_id, filename, size, mime_type, created_at_ms, \
     last_accessed_ms, content_hash, verified, pinned, status, priority";

/// SQLite store for blob metadata and payload bytes.
pub struct BlobStore {
    conn: Connection,
}

impl BlobStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(BlobStore { conn })
    }

    /// Opens an in-memory store for testing.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(BlobStore { conn })
    }

    /// Inserts or replaces a blob: metadata and payload in one transaction.
    pub fn insert(&mut self, meta: &BlobMeta, bytes: &[u8]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO blob_meta ({META_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                meta.conversation_id,
                meta.filename,
                meta.size as i64,
                meta.mime_type,
                meta.created_at_ms as i64,
                meta.last_accessed_ms as i64,
                meta.content_hash,
                meta.verified,
                meta.pinned,
                meta.status.to_string(),
                meta.priority,
            ],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO blob_data (conversation_id, filename, bytes) \
             VALUES (?1, ?2, ?3)",
            params![meta.conversation_id, meta.filename, bytes],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Inserts or replaces a metadata row without a payload.
    ///
    /// Used to record failed downloads so they are not retried
    /// automatically.
    pub fn put_meta(&mut self, meta: &BlobMeta) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO blob_meta ({META_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                meta.conversation_id,
                meta.filename,
                meta.size as i64,
                meta.mime_type,
                meta.created_at_ms as i64,
                meta.last_accessed_ms as i64,
                meta.content_hash,
                meta.verified,
                meta.pinned,
                meta.status.to_string(),
                meta.priority,
            ],
        )?;
        Ok(())
    }

    /// Returns the metadata row for a blob, if present.
    pub fn get_meta(&self, conversation_id: &str, filename: &str) -> Result<Option<BlobMeta>> {
        let meta = self
            .conn
            .query_row(
                &format!(
                    "SELECT {META_COLUMNS} FROM blob_meta \
                     WHERE conversation_id = ?1 AND filename = ?2"
                ),
                params![conversation_id, filename],
                row_to_meta,
            )
            .optional()?;
        Ok(meta)
    }

    /// Returns the payload bytes for a blob, if present.
    pub fn get_bytes(&self, conversation_id: &str, filename: &str) -> Result<Option<Vec<u8>>> {
        let bytes = self
            .conn
            .query_row(
                "SELECT bytes FROM blob_data WHERE conversation_id = ?1 AND filename = ?2",
                params![conversation_id, filename],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes)
    }

    /// Updates the last-accessed timestamp (the LRU touch).
    pub fn touch(&mut self, conversation_id: &str, filename: &str, now_ms: u64) -> Result<()> {
        self.conn.execute(
            "UPDATE blob_meta SET last_accessed_ms = ?3 \
             WHERE conversation_id = ?1 AND filename = ?2",
            params![conversation_id, filename, now_ms as i64],
        )?;
        Ok(())
    }

    /// Sets the pin flag. Returns the number of rows updated (0 or 1).
    pub fn set_pinned(&mut self, conversation_id: &str, filename: &str, pinned: bool) -> Result<usize> {
        let n = self.conn.execute(
            "UPDATE blob_meta SET pinned = ?3 WHERE conversation_id = ?1 AND filename = ?2",
            params![conversation_id, filename, pinned],
        )?;
        Ok(n)
    }

    /// Sets the verified flag.
    pub fn set_verified(&mut self, conversation_id: &str, filename: &str, verified: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE blob_meta SET verified = ?3 WHERE conversation_id = ?1 AND filename = ?2",
            params![conversation_id, filename, verified],
        )?;
        Ok(())
    }

    /// Deletes a blob: metadata and payload in one transaction.
    ///
    /// Returns true if an entry was removed.
    pub fn delete(&mut self, conversation_id: &str, filename: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let n = tx.execute(
            "DELETE FROM blob_meta WHERE conversation_id = ?1 AND filename = ?2",
            params![conversation_id, filename],
        )?;
        tx.execute(
            "DELETE FROM blob_data WHERE conversation_id = ?1 AND filename = ?2",
            params![conversation_id, filename],
        )?;
        tx.commit()?;
        Ok(n > 0)
    }

    /// Deletes all blobs for a conversation. Returns the number removed.
    pub fn delete_conversation(&mut self, conversation_id: &str) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let n = tx.execute(
            "DELETE FROM blob_meta WHERE conversation_id = ?1",
            params![conversation_id],
        )?;
        tx.execute(
            "DELETE FROM blob_data WHERE conversation_id = ?1",
            params![conversation_id],
        )?;
        tx.commit()?;
        Ok(n)
    }

    /// Deletes everything. Returns the number of entries removed.
    pub fn clear_all(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let n = tx.execute("DELETE FROM blob_meta", [])?;
        tx.execute("DELETE FROM blob_data", [])?;
        tx.commit()?;
        Ok(n)
    }

    /// Total payload bytes accounted for by completed entries.
    pub fn total_size(&self) -> Result<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(size), 0) FROM blob_meta WHERE status = 'completed'",
            [],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    /// Number of metadata rows.
    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM blob_meta", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Completed, unpinned entries in ascending last-accessed order.
    ///
    /// This is the eviction candidate list.
    pub fn evictable_oldest_first(&self) -> Result<Vec<BlobMeta>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {META_COLUMNS} FROM blob_meta \
             WHERE pinned = 0 AND status = 'completed' \
             ORDER BY last_accessed_ms ASC"
        ))?;
        let rows = stmt.query_map([], row_to_meta)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
