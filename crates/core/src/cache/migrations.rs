//! Schema for the cache stores.
//!
//! `_migrations` records the highest applied version. On open, every script
//! above that version runs once, in order.

use std::num::ParseIntError;

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Versioned SQL scripts, oldest first.
const MIGRATIONS: &[(&str, &str)] = &[
    ("1", include_str!("../../migrations/001_cache_stores.sql")),
    ("2", include_str!("../../migrations/002_entry_revision.sql")),
];

/// Bring the cache schema up to date.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
        )?;
        let applied: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        let pending = MIGRATIONS.iter().map(|(version, sql)| {
            version
                .parse::<i64>()
                .map(|version| (version, *sql))
                .map_err(|e: ParseIntError| Error::MigrationFailed(format!("bad version {version:?}: {e}")))
        });
        for step in pending {
            let (version, sql) = step?;
            if version <= applied {
                continue;
            }
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied cache schema migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let has_entries: bool = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='cache_entries')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();

        assert!(has_entries);
    }

    #[tokio::test]
    async fn test_migrations_version_tracking() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let count: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)))
            .await
            .unwrap();

        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_upgrade_adds_revision_to_existing_entries() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| {
            conn.execute_batch(MIGRATIONS[0].1)?;
            conn.execute_batch(
                "CREATE TABLE _migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);
                 INSERT INTO _migrations VALUES (1, '2026-01-01T00:00:00Z');
                 INSERT INTO cache_stores VALUES ('stock-dashboard-v1.2.0', '2026-01-01T00:00:00Z');
                 INSERT INTO cache_entries (store, key_hash, method, url, status, headers_json, body, stored_at)
                 VALUES ('stock-dashboard-v1.2.0', 'k', 'GET', 'http://localhost:5000/', 200, '[]', x'', '2026-01-01T00:00:00Z');",
            )
        })
        .await
        .unwrap();

        run(&conn).await.unwrap();

        let revision: i64 = conn
            .call(|conn| conn.query_row("SELECT revision FROM cache_entries WHERE key_hash = 'k'", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(revision, 0);
    }
}
