//! Database connection and catalog repositories

pub mod issues;
pub mod media_files;
pub mod schema;
pub mod sqlite_helpers;
pub mod store;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;

pub use issues::{
    CreateIssue, IssueFilter, IssueKind, IssueRecord, IssueRepository, IssueSeverity,
    IssueSyncOutcome,
};
pub use media_files::{
    CreateMediaFile, FileFilter, MediaFileRecord, MediaFileRepository, MediaType,
};
pub use store::{CatalogStore, PersistenceError};

/// Aggregate counts for the stats command
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LibraryStats {
    pub total_files: i64,
    pub movie_files: i64,
    pub tv_files: i64,
    pub total_size_bytes: i64,
    pub open_duplicate_issues: i64,
    pub open_low_res_issues: i64,
    pub open_missing_episode_issues: i64,
}

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the maximum connection pool size from environment or default
    fn get_max_connections() -> u32 {
        std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10)
    }

    /// Open (creating if missing) the SQLite database at the given path
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::get_max_connections())
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Open an in-memory database. Pinned to one connection so every
    /// handle sees the same database.
    pub async fn connect_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    /// Create the catalog tables and indexes if they do not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        schema::init_schema(&self.pool).await
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get a media files repository
    pub fn media_files(&self) -> MediaFileRepository {
        MediaFileRepository::new(self.pool.clone())
    }

    /// Get an issues repository
    pub fn issues(&self) -> IssueRepository {
        IssueRepository::new(self.pool.clone())
    }

    /// Aggregate library counts for the stats command
    pub async fn stats(&self) -> Result<LibraryStats> {
        let media_files = self.media_files();
        let issues = self.issues();

        Ok(LibraryStats {
            total_files: media_files.count().await?,
            movie_files: media_files.count_by_type(MediaType::Movie).await?,
            tv_files: media_files.count_by_type(MediaType::Tv).await?,
            total_size_bytes: media_files.total_size_bytes().await?,
            open_duplicate_issues: issues.count_open_by_kind(IssueKind::Duplicate).await?,
            open_low_res_issues: issues.count_open_by_kind(IssueKind::LowRes).await?,
            open_missing_episode_issues: issues
                .count_open_by_kind(IssueKind::MissingEpisode)
                .await?,
        })
    }
}
