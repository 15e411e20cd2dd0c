//! 数据库迁移模块
//!
//! `kv_store` 表的版本化迁移，已执行的版本记录在 `schema_migrations` 中。
//! 每个迁移连同它的记录行在同一个事务里提交。

use std::collections::BTreeSet;

use rusqlite::{params, Connection};

use crate::storage::{StorageError, StorageResult};

/// 当前数据库 schema 版本
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub sql: &'static str,
}

/// 全部迁移，按版本号升序
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "kv store",
        sql: "CREATE TABLE IF NOT EXISTS kv_store (
                  key TEXT PRIMARY KEY,
                  value TEXT NOT NULL
              );",
    },
    // 写入时间只用于排查问题
    Migration {
        version: 2,
        name: "kv store updated_at",
        sql: "ALTER TABLE kv_store ADD COLUMN updated_at TEXT;
              UPDATE kv_store SET updated_at = datetime('now') WHERE updated_at IS NULL;",
    },
];

const CREATE_MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

fn applied_versions(conn: &Connection) -> StorageResult<BTreeSet<i32>> {
    conn.execute_batch(CREATE_MIGRATIONS_TABLE)
        .map_err(|e| StorageError::Migration(format!("cannot create schema_migrations: {e}")))?;

    let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
    let versions = stmt
        .query_map([], |row| row.get::<_, i32>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(versions)
}

/// 当前数据库版本；未迁移或无法读取时为 0
pub fn get_current_version(conn: &Connection) -> i32 {
    applied_versions(conn)
        .ok()
        .and_then(|versions| versions.last().copied())
        .unwrap_or(0)
}

fn apply(conn: &Connection, migration: &Migration) -> StorageResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql).map_err(|e| {
        StorageError::Migration(format!("v{} ({}) failed: {e}", migration.version, migration.name))
    })?;
    tx.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
        params![migration.version, migration.name],
    )?;
    tx.commit()?;
    Ok(())
}

/// 执行所有未执行的迁移，返回最终版本号
pub fn run_migrations(conn: &Connection) -> StorageResult<i32> {
    let applied = applied_versions(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect();

    if pending.is_empty() {
        return Ok(applied.last().copied().unwrap_or(0));
    }

    for migration in pending {
        tracing::info!(version = migration.version, name = migration.name, "applying migration");
        if let Err(err) = apply(conn, migration) {
            tracing::error!(version = migration.version, error = %err, "migration failed");
            return Err(err);
        }
    }

    Ok(get_current_version(conn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_current_version(&conn), 0);

        assert_eq!(run_migrations(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
        assert_eq!(get_current_version(&conn), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), CURRENT_SCHEMA_VERSION);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_v2_backfills_updated_at() {
        let conn = Connection::open_in_memory().unwrap();
        applied_versions(&conn).unwrap();
        apply(&conn, &MIGRATIONS[0]).unwrap();
        conn.execute("INSERT INTO kv_store (key, value) VALUES ('k', 'v')", [])
            .unwrap();

        run_migrations(&conn).unwrap();

        let updated_at: Option<String> = conn
            .query_row("SELECT updated_at FROM kv_store WHERE key = 'k'", [], |row| row.get(0))
            .unwrap();
        assert!(updated_at.is_some());
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let conn = Connection::open_in_memory().unwrap();
        applied_versions(&conn).unwrap();
        let broken = Migration {
            version: 99,
            name: "broken",
            sql: "CREATE TABLE t (x INTEGER); THIS IS NOT SQL;",
        };

        assert!(matches!(apply(&conn, &broken), Err(StorageError::Migration(_))));

        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 't'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(exists, 0);
        assert_eq!(get_current_version(&conn), 0);
    }
}
