//! Catalog schema creation
//!
//! The schema is created idempotently at startup. `media_files` holds one row
//! per scanned file (unique by path); `media_issues` holds detected problems.
//! Resolved issues are kept for audit, so uniqueness of an issue key is only
//! enforced among unresolved rows (partial index).

use anyhow::{Context, Result};
use sqlx::SqlitePool;

const CREATE_MEDIA_FILES: &str = r#"
CREATE TABLE IF NOT EXISTS media_files (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    media_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    fingerprint TEXT NOT NULL,
    width INTEGER,
    height INTEGER,
    codec TEXT,
    bitrate_kbps INTEGER,
    duration_secs REAL,
    container TEXT NOT NULL,
    show_title TEXT,
    season INTEGER,
    episode INTEGER,
    created_at TEXT NOT NULL,
    scanned_at TEXT NOT NULL
)
"#;

const CREATE_MEDIA_ISSUES: &str = r#"
CREATE TABLE IF NOT EXISTS media_issues (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    severity TEXT NOT NULL,
    issue_key TEXT NOT NULL,
    file_paths TEXT NOT NULL,
    show_title TEXT,
    season INTEGER,
    episode INTEGER,
    detail TEXT NOT NULL,
    reclaimable_bytes INTEGER,
    canonical_path TEXT,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolved_at TEXT,
    created_at TEXT NOT NULL
)
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_media_files_fingerprint ON media_files (fingerprint)",
    "CREATE INDEX IF NOT EXISTS idx_media_files_media_type ON media_files (media_type)",
    "CREATE INDEX IF NOT EXISTS idx_media_issues_kind ON media_issues (kind)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_media_issues_open_key \
     ON media_issues (issue_key) WHERE resolved = 0",
];

/// Create tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CREATE_MEDIA_FILES)
        .execute(pool)
        .await
        .context("Failed to create media_files table")?;

    sqlx::query(CREATE_MEDIA_ISSUES)
        .execute(pool)
        .await
        .context("Failed to create media_issues table")?;

    for statement in CREATE_INDEXES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create index: {}", statement))?;
    }

    Ok(())
}
