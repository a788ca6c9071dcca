//! Frontier database schema
//!
//! This module contains the SQL schema for the SQLite frontier backend.

/// SQL schema for the frontier database
pub const SCHEMA_SQL: &str = r#"
-- Entries waiting for a host claim, oldest first
CREATE TABLE IF NOT EXISTS new_hosts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    host TEXT NOT NULL,
    added_at TEXT NOT NULL
);

-- Hosts that have been claimed at least once
CREATE TABLE IF NOT EXISTS hosts (
    host TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    claimed_at INTEGER NOT NULL,
    finished_at TEXT,
    reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_hosts_status ON hosts(status);

-- Per-host FIFO queues
CREATE TABLE IF NOT EXISTS url_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    host TEXT NOT NULL,
    url TEXT NOT NULL,
    UNIQUE(host, url)
);

CREATE INDEX IF NOT EXISTS idx_url_queue_host ON url_queue(host, id);

-- Global visited set
CREATE TABLE IF NOT EXISTS visited (
    url TEXT PRIMARY KEY,
    visited_at TEXT NOT NULL
);

-- Politeness markers, expiry in unix milliseconds
CREATE TABLE IF NOT EXISTS cooldowns (
    host TEXT PRIMARY KEY,
    until_ms INTEGER NOT NULL
);

-- Cached host policies (JSON)
CREATE TABLE IF NOT EXISTS host_policies (
    host TEXT PRIMARY KEY,
    policy TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the frontier schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema created (or already present)
/// * `Err(rusqlite::Error)` - Failed to create schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            tables,
            vec![
                "cooldowns",
                "host_policies",
                "hosts",
                "new_hosts",
                "url_queue",
                "visited"
            ]
        );
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
    }
}
