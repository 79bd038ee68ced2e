//! SQLite hit log

use super::{HitSink, LedgerRecord};
use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;

const CREATE_TARGET_HITS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS target_hits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    watchlist_name TEXT NOT NULL,
    scrip_name TEXT NOT NULL,
    target_price REAL NOT NULL,
    hit_price REAL NOT NULL,
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_target_hits_watchlist ON target_hits(watchlist_name, scrip_name);
"#;

/// Append-only SQLite table sink
pub struct SqliteHitSink {
    conn: Mutex<Connection>,
}

impl SqliteHitSink {
    /// Open (or create) the database file
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_target_hits", CREATE_TARGET_HITS_TABLE)?;
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

impl HitSink for SqliteHitSink {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    fn append(&self, record: &LedgerRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO target_hits (watchlist_name, scrip_name, target_price, hit_price, date, time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.watchlist_name,
                record.scrip_name,
                record.target_price,
                record.hit_price,
                record.date,
                record.time
            ],
        )?;
        Ok(())
    }

    fn records(&self) -> Result<Vec<LedgerRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT watchlist_name, scrip_name, target_price, hit_price, date, time
             FROM target_hits ORDER BY id",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(LedgerRecord {
                    watchlist_name: row.get(0)?,
                    scrip_name: row.get(1)?,
                    target_price: row.get(2)?,
                    hit_price: row.get(3)?,
                    date: row.get(4)?,
                    time: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(scrip: &str) -> LedgerRecord {
        LedgerRecord {
            watchlist_name: "FIBOST".to_string(),
            scrip_name: scrip.to_string(),
            target_price: 120.0,
            hit_price: 121.35,
            date: "2026-10-14".to_string(),
            time: "14:45:15".to_string(),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let sink = SqliteHitSink::in_memory().unwrap();
        sink.append(&record("IDEA")).unwrap();
        sink.append(&record("YESBANK")).unwrap();

        let records = sink.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], record("YESBANK"));
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hits.db");

        {
            let sink = SqliteHitSink::new(&path).unwrap();
            sink.append(&record("IDEA")).unwrap();
        }

        let sink = SqliteHitSink::new(&path).unwrap();
        assert_eq!(sink.records().unwrap(), vec![record("IDEA")]);
    }
}
