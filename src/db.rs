use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

pub async fn init_db(database_url: &str) -> SqlitePool {
    let options = SqliteConnectOptions::from_str(database_url)
        .expect("Invalid DATABASE_URL")
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .expect("Failed to connect to database");

    run_migrations(&pool)
        .await
        .expect("Failed to apply database schema");

    pool
}

/// Idempotent schema setup, applied on every startup.
///
/// The `UNIQUE(employee_id, date)` index on `attendance` is load-bearing: it
/// is what turns two concurrent entry marks for the same employee and day
/// into one insert and one constraint violation.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        username      TEXT NOT NULL UNIQUE,
        password      TEXT NOT NULL,
        role_id       INTEGER NOT NULL,
        employee_id   INTEGER,
        last_login_at TEXT,
        created_at    TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS refresh_tokens (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id    INTEGER NOT NULL,
        jti        TEXT NOT NULL UNIQUE,
        expires_at INTEGER NOT NULL,
        revoked    INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS departments (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        department_id  TEXT NOT NULL UNIQUE,
        name           TEXT NOT NULL,
        description    TEXT NOT NULL DEFAULT '',
        has_shifts     INTEGER NOT NULL DEFAULT 0,
        employee_count INTEGER NOT NULL DEFAULT 0,
        is_active      INTEGER NOT NULL DEFAULT 1,
        created_by     INTEGER,
        updated_by     INTEGER,
        created_at     TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at     TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shifts (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        shift_id            TEXT NOT NULL UNIQUE,
        name                TEXT NOT NULL,
        department_id       INTEGER NOT NULL,
        department_name     TEXT NOT NULL,
        start_time          TEXT NOT NULL,
        end_time            TEXT NOT NULL,
        work_duration_hours REAL NOT NULL,
        is_overnight        INTEGER NOT NULL DEFAULT 0,
        is_active           INTEGER NOT NULL DEFAULT 1,
        created_by          INTEGER,
        created_at          TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS employees (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_code       TEXT NOT NULL UNIQUE,
        first_name          TEXT NOT NULL,
        last_name           TEXT NOT NULL,
        email               TEXT NOT NULL UNIQUE,
        phone               TEXT,
        job_role            TEXT,
        department_id       INTEGER NOT NULL,
        department_name     TEXT NOT NULL,
        shift_id            INTEGER,
        shift_name          TEXT,
        monthly_salary      REAL NOT NULL DEFAULT 0,
        hourly_rate         REAL,
        overtime_multiplier REAL,
        overtime_rate       REAL,
        is_active           INTEGER NOT NULL DEFAULT 1,
        joining_date        TEXT NOT NULL,
        created_at          TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id                    INTEGER PRIMARY KEY AUTOINCREMENT,
        attendance_id         TEXT NOT NULL UNIQUE,
        employee_id           INTEGER NOT NULL,
        employee_code         TEXT NOT NULL,
        employee_name         TEXT NOT NULL,
        department_id         INTEGER NOT NULL,
        department_name       TEXT NOT NULL,
        shift_id              INTEGER,
        shift_name            TEXT,
        date                  TEXT NOT NULL,
        entry_time            TEXT,
        exit_time             TEXT,
        work_duration_minutes INTEGER,
        regular_hours         REAL,
        overtime_hours        REAL,
        total_hours           REAL,
        status                TEXT NOT NULL DEFAULT 'pending',
        is_corrected          INTEGER NOT NULL DEFAULT 0,
        corrected_by          INTEGER,
        correction_reason     TEXT,
        overtime_approved_by  INTEGER,
        overtime_reason       TEXT,
        marked_by             INTEGER NOT NULL,
        created_at            TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at            TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE (employee_id, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        action             TEXT NOT NULL,
        entity_type        TEXT NOT NULL,
        entity_id          TEXT NOT NULL,
        performed_by       INTEGER NOT NULL,
        performed_by_name  TEXT NOT NULL,
        performed_by_role  TEXT NOT NULL,
        target_employee_id INTEGER,
        previous_data      TEXT,
        new_data           TEXT,
        reason             TEXT,
        created_at         TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS history_logs (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id    INTEGER NOT NULL,
        change_type    TEXT NOT NULL,
        previous_data  TEXT,
        new_data       TEXT,
        changed_fields TEXT,
        changed_by     INTEGER NOT NULL,
        reason         TEXT,
        created_at     TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS counters (
        name  TEXT PRIMARY KEY,
        value INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance (date)",
    "CREATE INDEX IF NOT EXISTS idx_attendance_department ON attendance (department_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_jti ON refresh_tokens (jti)",
];

/// Fresh single-connection in-memory database for service tests.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    run_migrations(&pool).await.expect("test schema");
    pool
}
