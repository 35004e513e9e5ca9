//! Database schema migrations for driftmirror.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: goals, check-ins, plan versions, signals, reports, feedback.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS goals (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            why         TEXT,
            mode        TEXT NOT NULL DEFAULT 'personal_growth',
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS checkins (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id             INTEGER NOT NULL REFERENCES goals(id),
            did_minimum_action  INTEGER NOT NULL DEFAULT 0,
            friction            INTEGER NOT NULL DEFAULT 2,
            blocker             TEXT,
            extra_done          TEXT,
            occurred_at         TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS plans (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id             INTEGER NOT NULL REFERENCES goals(id),
            version             INTEGER NOT NULL,
            frequency_per_week  INTEGER NOT NULL,
            min_minutes         INTEGER NOT NULL,
            time_window         TEXT,
            minimum_action_text TEXT,
            recovery_step       TEXT,
            created_at          TEXT NOT NULL,
            UNIQUE (goal_id, version)
        );

        CREATE TABLE IF NOT EXISTS signals (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            checkin_id  INTEGER NOT NULL REFERENCES checkins(id),
            kind        TEXT NOT NULL,
            content     TEXT NOT NULL,
            severity    REAL NOT NULL DEFAULT 0.5
        );

        CREATE TABLE IF NOT EXISTS mirror_reports (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id         INTEGER NOT NULL REFERENCES goals(id),
            findings        TEXT NOT NULL,
            counterfactual  TEXT,
            drift_score     REAL NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS feedback (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            mirror_report_id  INTEGER NOT NULL REFERENCES mirror_reports(id),
            helpful           INTEGER NOT NULL,
            created_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_checkins_goal_time ON checkins(goal_id, occurred_at);
        CREATE INDEX IF NOT EXISTS idx_signals_checkin ON signals(checkin_id);
        CREATE INDEX IF NOT EXISTS idx_reports_goal ON mirror_reports(goal_id);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: richer mirror reports and insight actions.
///
/// Adds to mirror_reports:
/// - rules_applied: JSON array of rule tags
/// - recurring_blockers: JSON array of blockers mentioned twice or more
/// - strength_pattern: what is working
/// - source: generated | deterministic
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE mirror_reports ADD COLUMN rules_applied TEXT NOT NULL DEFAULT '[]';
         ALTER TABLE mirror_reports ADD COLUMN recurring_blockers TEXT NOT NULL DEFAULT '[]';
         ALTER TABLE mirror_reports ADD COLUMN strength_pattern TEXT;
         ALTER TABLE mirror_reports ADD COLUMN source TEXT NOT NULL DEFAULT 'deterministic';

         CREATE TABLE IF NOT EXISTS insight_actions (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            goal_id            INTEGER NOT NULL REFERENCES goals(id),
            suggestion_kind    TEXT NOT NULL,
            action             TEXT NOT NULL,
            suggested_changes  TEXT NOT NULL DEFAULT '{}',
            mirror_report_id   INTEGER REFERENCES mirror_reports(id),
            created_at         TEXT NOT NULL
         );",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

/// Migration v3: persistent rate limit hits.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS rate_limit_hits (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            key     TEXT NOT NULL,
            hit_at  TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_rate_limit_key_time ON rate_limit_hits(key, hit_at);",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("SELECT name FROM pragma_table_info('{table}')"))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn test_migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        let report_columns = columns(&conn, "mirror_reports");
        for expected in ["rules_applied", "recurring_blockers", "strength_pattern", "source"] {
            assert!(report_columns.iter().any(|c| c == expected), "missing {expected}");
        }
        assert!(!columns(&conn, "insight_actions").is_empty());
        assert!(!columns(&conn, "rate_limit_hits").is_empty());
    }

    #[test]
    fn test_migrate_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn test_incremental_migration_keeps_reports() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 1);

        conn.execute(
            "INSERT INTO goals (title, created_at) VALUES ('Read', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO mirror_reports (goal_id, findings, counterfactual, drift_score, created_at)
             VALUES (1, '[]', 'x', 0.5, '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        let (rules, source): (String, String) = conn
            .query_row(
                "SELECT rules_applied, source FROM mirror_reports WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(rules, "[]");
        assert_eq!(source, "deterministic");
    }
}
