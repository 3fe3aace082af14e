//! Versioned schema migrations for the message store.
//!
//! Migrations are an explicit ordered list; each step is tagged with the
//! schema version it produces and applied cumulatively from the stored
//! `user_version` to the latest, so a store created at any older version
//! upgrades incrementally.

use rusqlite::Connection;

use crate::error::Result;

/// One schema step. Applying `sql` brings the database to `version`.
pub struct Migration {
  pub version: i64,
  pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
  Migration {
    version: 1,
    sql: "CREATE TABLE IF NOT EXISTS wittrs (
            id   TEXT PRIMARY KEY,
            time INTEGER NOT NULL,
            data BLOB NOT NULL
          );",
  },
  Migration {
    version: 2,
    // Secondary ordering index. `id` participates so equal-time records
    // traverse in a deterministic order.
    sql: "CREATE INDEX IF NOT EXISTS by_date ON wittrs(time, id);",
  },
];

/// Latest schema version produced by [`MIGRATIONS`].
pub fn latest_version() -> i64 {
  MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Apply every migration newer than the stored version, in order.
pub fn apply(conn: &Connection) -> Result<()> {
  let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

  for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
    conn.execute_batch(migration.sql)?;
    // PRAGMA does not support parameters
    conn.execute_batch(&format!("PRAGMA user_version = {}", migration.version))?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_migrations_are_ordered_and_dense() {
    for (i, migration) in MIGRATIONS.iter().enumerate() {
      assert_eq!(migration.version, i as i64 + 1);
    }
  }

  #[test]
  fn test_apply_from_empty() {
    let conn = Connection::open_in_memory().unwrap();
    apply(&conn).unwrap();

    let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
    assert_eq!(version, latest_version());

    // Table and index both exist
    conn.execute("INSERT INTO wittrs (id, time, data) VALUES ('a', 1, x'00')", []).unwrap();
    let indexed: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'by_date'",
        [],
        |r| r.get(0),
      )
      .unwrap();
    assert_eq!(indexed, 1);
  }

  #[test]
  fn test_apply_is_incremental_from_partial_version() {
    let conn = Connection::open_in_memory().unwrap();

    // Simulate a database left at version 1
    conn.execute_batch(MIGRATIONS[0].sql).unwrap();
    conn.execute_batch("PRAGMA user_version = 1").unwrap();

    apply(&conn).unwrap();
    let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
    assert_eq!(version, latest_version());
  }

  #[test]
  fn test_apply_twice_is_a_noop() {
    let conn = Connection::open_in_memory().unwrap();
    apply(&conn).unwrap();
    apply(&conn).unwrap();
  }
}
