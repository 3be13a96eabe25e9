//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the idcrawl database.

/// Checkpoint keys stored in the `progress` table
pub const KEY_LAST_ID: &str = "last_id";
pub const KEY_LAST_SEEN_DATE: &str = "last_seen_date";
pub const KEY_TOTAL_SUCCESS_COUNT: &str = "total_success_count";

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawled item
CREATE TABLE IF NOT EXISTS records (
    id INTEGER NOT NULL CHECK (id > 0),
    source TEXT NOT NULL,
    title TEXT,
    date TEXT,
    summary TEXT,
    category TEXT,
    body TEXT,
    url TEXT NOT NULL,
    PRIMARY KEY (id, source)
);

CREATE INDEX IF NOT EXISTS idx_records_category ON records(source, category);
CREATE INDEX IF NOT EXISTS idx_records_date ON records(source, date);

-- Checkpoint key/value pairs, one set per source
CREATE TABLE IF NOT EXISTS progress (
    source TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (source, key)
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
