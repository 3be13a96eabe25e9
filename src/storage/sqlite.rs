//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::{
    initialize_schema, KEY_LAST_ID, KEY_LAST_SEEN_DATE, KEY_TOTAL_SUCCESS_COUNT,
};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{Checkpoint, Record};
use crate::CrawlError;
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

/// Dates are stored as ISO-8601 calendar dates
const DATE_FORMAT: &str = "%Y-%m-%d";

const UPSERT_RECORD_SQL: &str = "
    INSERT INTO records (id, source, title, date, summary, category, body, url)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(id, source) DO UPDATE SET
        title = excluded.title,
        date = excluded.date,
        summary = excluded.summary,
        category = excluded.category,
        body = excluded.body,
        url = excluded.url";

const SELECT_RECORD_SQL: &str = "
    SELECT id, source, title, date, summary, category, body, url
    FROM records WHERE id = ?1 AND source = ?2";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path` and ensures the schema exists
    pub fn new(path: &Path) -> Result<Self, CrawlError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    // ===== Records =====

    fn upsert_batch(&mut self, records: &[Record]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        upsert_records(&tx, records)?;
        tx.commit()?;
        Ok(())
    }

    fn load_existing_ids(&self, source: &str) -> StorageResult<HashSet<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM records WHERE source = ?1")?;

        let ids = stmt
            .query_map(params![source], |row| row.get(0))?
            .collect::<Result<HashSet<i64>, _>>()?;

        Ok(ids)
    }

    fn get_record(&self, id: i64, source: &str) -> StorageResult<Option<Record>> {
        let record = self
            .conn
            .query_row(SELECT_RECORD_SQL, params![id, source], row_to_record)
            .optional()?;
        Ok(record)
    }

    // ===== Checkpoint =====

    fn read_checkpoint(&self, source: &str) -> StorageResult<Option<Checkpoint>> {
        read_checkpoint_from(&self.conn, source)
    }

    fn write_checkpoint_and_batch(
        &mut self,
        checkpoint: &Checkpoint,
        records: &[Record],
    ) -> StorageResult<()> {
        // Dropping the transaction on an early return rolls everything back
        let tx = self.conn.transaction()?;

        upsert_records(&tx, records)?;

        let merged = match read_checkpoint_from(&tx, &checkpoint.source)? {
            Some(stored) => Checkpoint {
                source: checkpoint.source.clone(),
                last_id: stored.last_id.max(checkpoint.last_id),
                last_seen_date: checkpoint.last_seen_date.or(stored.last_seen_date),
                total_success_count: stored
                    .total_success_count
                    .max(checkpoint.total_success_count),
            },
            None => checkpoint.clone(),
        };
        write_checkpoint_to(&tx, &merged)?;

        tx.commit()?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_records(&self, source: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_by_category(&self, source: &str) -> StorageResult<Vec<(Option<String>, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*) AS total FROM records
             WHERE source = ?1
             GROUP BY category
             ORDER BY total DESC, category ASC",
        )?;

        let counts = stmt
            .query_map(params![source], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn count_by_year(
        &self,
        source: &str,
        from_year: Option<i32>,
        to_year: Option<i32>,
    ) -> StorageResult<Vec<(i32, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT CAST(substr(date, 1, 4) AS INTEGER) AS year, COUNT(*) FROM records
             WHERE source = ?1 AND date IS NOT NULL AND date != ''
             GROUP BY year
             HAVING year BETWEEN ?2 AND ?3
             ORDER BY year ASC",
        )?;

        let from = from_year.unwrap_or(i32::MIN);
        let to = to_year.unwrap_or(i32::MAX);
        let counts = stmt
            .query_map(params![source, from, to], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}

fn upsert_records(conn: &Connection, records: &[Record]) -> StorageResult<()> {
    let mut stmt = conn.prepare_cached(UPSERT_RECORD_SQL)?;

    for record in records {
        stmt.execute(params![
            record.id,
            record.source,
            record.title,
            record.date.map(|d| d.format(DATE_FORMAT).to_string()),
            record.summary,
            record.category,
            record.body,
            record.url,
        ])?;
    }

    Ok(())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let date = row
        .get::<_, Option<String>>(3)?
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))
        })
        .transpose()?;

    Ok(Record {
        id: row.get(0)?,
        source: row.get(1)?,
        title: row.get(2)?,
        date,
        summary: row.get(4)?,
        category: row.get(5)?,
        body: row.get(6)?,
        url: row.get(7)?,
    })
}

fn read_checkpoint_from(conn: &Connection, source: &str) -> StorageResult<Option<Checkpoint>> {
    let mut stmt = conn.prepare_cached("SELECT key, value FROM progress WHERE source = ?1")?;
    let rows = stmt
        .query_map(params![source], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Ok(None);
    }

    let corrupt = |key: &str, value: &str| StorageError::Corrupt {
        source_tag: source.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    };

    let mut checkpoint = Checkpoint::new(source);
    for (key, value) in rows {
        match key.as_str() {
            KEY_LAST_ID => {
                checkpoint.last_id = value.parse().map_err(|_| corrupt(&key, &value))?;
            }
            KEY_TOTAL_SUCCESS_COUNT => {
                checkpoint.total_success_count =
                    value.parse().map_err(|_| corrupt(&key, &value))?;
            }
            KEY_LAST_SEEN_DATE if value.is_empty() => checkpoint.last_seen_date = None,
            KEY_LAST_SEEN_DATE => {
                checkpoint.last_seen_date = Some(
                    NaiveDate::parse_from_str(&value, DATE_FORMAT)
                        .map_err(|_| corrupt(&key, &value))?,
                );
            }
            other => tracing::debug!("Ignoring unknown progress key '{}' for {}", other, source),
        }
    }

    Ok(Some(checkpoint))
}

fn write_checkpoint_to(conn: &Connection, checkpoint: &Checkpoint) -> StorageResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO progress (source, key, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(source, key) DO UPDATE SET value = excluded.value",
    )?;

    let last_seen_date = checkpoint
        .last_seen_date
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default();

    for (key, value) in [
        (KEY_LAST_ID, checkpoint.last_id.to_string()),
        (KEY_LAST_SEEN_DATE, last_seen_date),
        (
            KEY_TOTAL_SUCCESS_COUNT,
            checkpoint.total_success_count.to_string(),
        ),
    ] {
        stmt.execute(params![checkpoint.source, key, value])?;
    }

    Ok(())
}
