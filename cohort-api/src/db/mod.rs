//! Database initialization and queries

pub mod queries;

use cohort_common::{auth, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the SQLite database and ensure the schema.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys (needed for the grade-row cascade)
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL for concurrent readers during imports
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables if they don't exist. Idempotent, safe to call on every
/// startup.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS students (
            student_id TEXT PRIMARY KEY,
            full_name TEXT,
            birth_date TEXT,
            class_code TEXT,
            birthplace TEXT,
            created_at TEXT DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    // All numeric-looking columns are TEXT on purpose: the upstream import
    // is stringly typed and parsing is deferred to the reconciler.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS grade_rows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id TEXT NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
            subject_code TEXT,
            subject_name TEXT,
            term TEXT,
            credits TEXT,
            attendance TEXT,
            coef1_1 TEXT,
            coef1_2 TEXT,
            coef1_3 TEXT,
            coef1_4 TEXT,
            coef2_1 TEXT,
            coef2_2 TEXT,
            coef2_3 TEXT,
            coef2_4 TEXT,
            practical_1 TEXT,
            practical_2 TEXT,
            periodic_avg TEXT,
            exam_eligible TEXT,
            exam_score TEXT,
            final_10 TEXT,
            final_4 TEXT,
            letter_grade TEXT,
            classification TEXT,
            result TEXT,
            term_avg_10 TEXT,
            term_avg_4 TEXT,
            cum_avg_10 TEXT,
            cum_avg_4 TEXT,
            data_source TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_grade_rows_student ON grade_rows(student_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role INTEGER NOT NULL DEFAULT 0,
            created_at TEXT DEFAULT (datetime('now')),
            reset_limit_at TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS account_access (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL,
            access_date TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 1,
            UNIQUE(account_id, access_date)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the default admin account when no `admin` user exists yet.
pub async fn seed_admin(pool: &SqlitePool, password: &str) -> Result<()> {
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM accounts WHERE username = 'admin'")
            .fetch_optional(pool)
            .await?;

    if existing.is_none() {
        sqlx::query(
            "INSERT INTO accounts (username, password_hash, role) VALUES ('admin', ?, 1)",
        )
        .bind(auth::hash_password(password))
        .execute(pool)
        .await?;
        info!("Created default admin account");
    }

    Ok(())
}
