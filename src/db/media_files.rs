//! Media file catalog repository
//!
//! One row per scanned file, unique by absolute path. The scanner upserts by
//! path on every pass; analysis passes only read these rows. Probe-derived
//! fields (width/height/codec/bitrate/duration) are nullable: a file whose
//! embedded metadata cannot be read is still cataloged.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::sqlite_helpers::{now_iso8601, str_to_datetime, str_to_uuid, uuid_to_str};
use crate::db::store::PersistenceError;

/// Kind of library content a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(MediaType::Movie),
            "tv" => Some(MediaType::Tv),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Media file record from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFileRecord {
    pub id: Uuid,
    pub path: String,
    pub media_type: MediaType,
    pub size_bytes: i64,
    pub fingerprint: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub codec: Option<String>,
    pub bitrate_kbps: Option<i64>,
    pub duration_secs: Option<f64>,
    pub container: String,
    pub show_title: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub scanned_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for MediaFileRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let id_str: String = row.try_get("id")?;
        let media_type_str: String = row.try_get("media_type")?;
        let created_at_str: String = row.try_get("created_at")?;
        let scanned_at_str: String = row.try_get("scanned_at")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(|e| sqlx::Error::Decode(e.into()))?,
            path: row.try_get("path")?,
            media_type: MediaType::from_str(&media_type_str).ok_or_else(|| {
                sqlx::Error::Decode(format!("unknown media_type '{}'", media_type_str).into())
            })?,
            size_bytes: row.try_get("size_bytes")?,
            fingerprint: row.try_get("fingerprint")?,
            width: row.try_get("width")?,
            height: row.try_get("height")?,
            codec: row.try_get("codec")?,
            bitrate_kbps: row.try_get("bitrate_kbps")?,
            duration_secs: row.try_get("duration_secs")?,
            container: row.try_get("container")?,
            show_title: row.try_get("show_title")?,
            season: row.try_get("season")?,
            episode: row.try_get("episode")?,
            created_at: str_to_datetime(&created_at_str)
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
            scanned_at: str_to_datetime(&scanned_at_str)
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
        })
    }
}

/// Input for creating or refreshing a media file row
#[derive(Debug, Clone)]
pub struct CreateMediaFile {
    pub path: String,
    pub media_type: MediaType,
    pub size_bytes: i64,
    pub fingerprint: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub codec: Option<String>,
    pub bitrate_kbps: Option<i64>,
    pub duration_secs: Option<f64>,
    pub container: String,
    pub show_title: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
}

/// Filter options for querying media files
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub media_type: Option<MediaType>,
    pub fingerprint: Option<String>,
}

pub struct MediaFileRepository {
    pool: SqlitePool,
}

impl MediaFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a batch of file records in a single transaction.
    ///
    /// Conflict target is the unique path: an existing row keeps its id and
    /// created_at, everything else (including scanned_at) is refreshed. The
    /// batch commits or rolls back as a whole.
    pub async fn upsert_batch(&self, records: &[CreateMediaFile]) -> Result<(), PersistenceError> {
        if records.is_empty() {
            return Ok(());
        }

        let to_persistence = |source| PersistenceError::Files {
            count: records.len(),
            source,
        };

        let mut tx = self.pool.begin().await.map_err(to_persistence)?;

        for record in records {
            let now = now_iso8601();
            sqlx::query(
                r#"
                INSERT INTO media_files (
                    id, path, media_type, size_bytes, fingerprint,
                    width, height, codec, bitrate_kbps, duration_secs,
                    container, show_title, season, episode,
                    created_at, scanned_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                ON CONFLICT (path) DO UPDATE SET
                    media_type = excluded.media_type,
                    size_bytes = excluded.size_bytes,
                    fingerprint = excluded.fingerprint,
                    width = excluded.width,
                    height = excluded.height,
                    codec = excluded.codec,
                    bitrate_kbps = excluded.bitrate_kbps,
                    duration_secs = excluded.duration_secs,
                    container = excluded.container,
                    show_title = excluded.show_title,
                    season = excluded.season,
                    episode = excluded.episode,
                    scanned_at = excluded.scanned_at
                "#,
            )
            .bind(uuid_to_str(Uuid::new_v4()))
            .bind(&record.path)
            .bind(record.media_type.as_str())
            .bind(record.size_bytes)
            .bind(&record.fingerprint)
            .bind(record.width)
            .bind(record.height)
            .bind(&record.codec)
            .bind(record.bitrate_kbps)
            .bind(record.duration_secs)
            .bind(&record.container)
            .bind(&record.show_title)
            .bind(record.season)
            .bind(record.episode)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(to_persistence)?;
        }

        tx.commit().await.map_err(to_persistence)?;
        Ok(())
    }

    /// List files matching a filter, ordered by path for stable snapshots
    pub async fn list(
        &self,
        filter: &FileFilter,
    ) -> Result<Vec<MediaFileRecord>, PersistenceError> {
        let mut sql = String::from("SELECT * FROM media_files WHERE 1=1");
        if filter.media_type.is_some() {
            sql.push_str(" AND media_type = ?");
        }
        if filter.fingerprint.is_some() {
            sql.push_str(" AND fingerprint = ?");
        }
        sql.push_str(" ORDER BY path");

        let mut query = sqlx::query_as::<_, MediaFileRecord>(&sql);
        if let Some(media_type) = filter.media_type {
            query = query.bind(media_type.as_str());
        }
        if let Some(ref fingerprint) = filter.fingerprint {
            query = query.bind(fingerprint.clone());
        }

        query
            .fetch_all(&self.pool)
            .await
            .map_err(|source| PersistenceError::Query { source })
    }

    /// Get a media file by path
    pub async fn get_by_path(&self, path: &str) -> Result<Option<MediaFileRecord>> {
        let record =
            sqlx::query_as::<_, MediaFileRecord>("SELECT * FROM media_files WHERE path = ?1")
                .bind(path)
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }

    /// Total number of cataloged files
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM media_files")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Number of cataloged files of one media type
    pub async fn count_by_type(&self, media_type: MediaType) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM media_files WHERE media_type = ?1")
                .bind(media_type.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Sum of size_bytes across the catalog
    pub async fn total_size_bytes(&self) -> Result<i64> {
        let total =
            sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(size_bytes), 0) FROM media_files")
                .fetch_one(&self.pool)
                .await?;

        Ok(total)
    }

    /// Delete a file row by path. The scanner and analyzer never call this;
    /// it exists for external cleanup after files are removed from disk.
    pub async fn delete_by_path(&self, path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_files WHERE path = ?1")
            .bind(path)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
