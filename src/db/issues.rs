//! Analysis issue repository
//!
//! Issues are findings produced by analysis passes (duplicate groups, quality
//! shortfalls, missing episodes). Each open issue carries a deterministic
//! issue_key so a later pass over the same library state lands on the same
//! row instead of stacking duplicates; a partial unique index enforces one
//! open row per key. Superseded issues are marked resolved, never deleted,
//! so the audit trail survives.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::sqlite_helpers::{
    int_to_bool, json_to_vec, now_iso8601, str_to_datetime, str_to_datetime_opt, str_to_uuid,
    uuid_to_str, vec_to_json,
};
use crate::db::store::PersistenceError;

/// Category of analysis finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Duplicate,
    LowRes,
    MissingEpisode,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Duplicate => "duplicate",
            IssueKind::LowRes => "low_res",
            IssueKind::MissingEpisode => "missing_episode",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "duplicate" => Some(IssueKind::Duplicate),
            "low_res" => Some(IssueKind::LowRes),
            "missing_episode" => Some(IssueKind::MissingEpisode),
            _ => None,
        }
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How urgently an issue needs attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Critical,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Warning => "warning",
            IssueSeverity::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "warning" => Some(IssueSeverity::Warning),
            "critical" => Some(IssueSeverity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Analysis issue record from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: Uuid,
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub issue_key: String,
    pub file_paths: Vec<String>,
    pub show_title: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub detail: String,
    pub reclaimable_bytes: Option<i64>,
    pub canonical_path: Option<String>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for IssueRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        use sqlx::Row;

        let id_str: String = row.try_get("id")?;
        let kind_str: String = row.try_get("kind")?;
        let severity_str: String = row.try_get("severity")?;
        let file_paths_json: String = row.try_get("file_paths")?;
        let resolved_int: i32 = row.try_get("resolved")?;
        let resolved_at_str: Option<String> = row.try_get("resolved_at")?;
        let created_at_str: String = row.try_get("created_at")?;

        Ok(Self {
            id: str_to_uuid(&id_str).map_err(|e| sqlx::Error::Decode(e.into()))?,
            kind: IssueKind::from_str(&kind_str).ok_or_else(|| {
                sqlx::Error::Decode(format!("unknown issue kind '{}'", kind_str).into())
            })?,
            severity: IssueSeverity::from_str(&severity_str).ok_or_else(|| {
                sqlx::Error::Decode(format!("unknown issue severity '{}'", severity_str).into())
            })?,
            issue_key: row.try_get("issue_key")?,
            file_paths: json_to_vec(&file_paths_json),
            show_title: row.try_get("show_title")?,
            season: row.try_get("season")?,
            episode: row.try_get("episode")?,
            detail: row.try_get("detail")?,
            reclaimable_bytes: row.try_get("reclaimable_bytes")?,
            canonical_path: row.try_get("canonical_path")?,
            resolved: int_to_bool(resolved_int),
            resolved_at: str_to_datetime_opt(resolved_at_str.as_deref())
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
            created_at: str_to_datetime(&created_at_str)
                .map_err(|e| sqlx::Error::Decode(e.into()))?,
        })
    }
}

/// Input for recording a detected issue
#[derive(Debug, Clone)]
pub struct CreateIssue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub issue_key: String,
    pub file_paths: Vec<String>,
    pub show_title: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub detail: String,
    pub reclaimable_bytes: Option<i64>,
    pub canonical_path: Option<String>,
}

impl CreateIssue {
    /// A group of files sharing one fingerprint
    pub fn duplicate(
        fingerprint: &str,
        file_paths: Vec<String>,
        canonical_path: String,
        reclaimable_bytes: i64,
        detail: String,
    ) -> Self {
        Self {
            kind: IssueKind::Duplicate,
            severity: IssueSeverity::Warning,
            issue_key: format!("duplicate:{}", fingerprint),
            file_paths,
            show_title: None,
            season: None,
            episode: None,
            detail,
            reclaimable_bytes: Some(reclaimable_bytes),
            canonical_path: Some(canonical_path),
        }
    }

    /// A file below the configured quality floor
    pub fn low_res(path: &str, severity: IssueSeverity, detail: String) -> Self {
        Self {
            kind: IssueKind::LowRes,
            severity,
            issue_key: format!("low_res:{}", path),
            file_paths: vec![path.to_string()],
            show_title: None,
            season: None,
            episode: None,
            detail,
            reclaimable_bytes: None,
            canonical_path: None,
        }
    }

    /// An episode gap inside an observed season range. References no files:
    /// the finding is about a file that does not exist.
    pub fn missing_episode(show_title: &str, season: i64, episode: i64) -> Self {
        Self {
            kind: IssueKind::MissingEpisode,
            severity: IssueSeverity::Warning,
            issue_key: format!(
                "missing_episode:{}:{}:{}",
                show_title.to_lowercase(),
                season,
                episode
            ),
            file_paths: Vec::new(),
            show_title: Some(show_title.to_string()),
            season: Some(season),
            episode: Some(episode),
            detail: format!("{} season {} is missing episode {}", show_title, season, episode),
            reclaimable_bytes: None,
            canonical_path: None,
        }
    }
}

/// Filter options for querying issues
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub kind: Option<IssueKind>,
    pub include_resolved: bool,
}

/// Counts from one issue sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueSyncOutcome {
    pub created: u64,
    pub refreshed: u64,
    pub resolved: u64,
}

pub struct IssueRepository {
    pool: SqlitePool,
}

impl IssueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reconcile the open issues of one kind against a fresh detection pass,
    /// in a single transaction.
    ///
    /// Open issues whose key was not detected this time are marked resolved.
    /// Detected issues refresh their open row when one exists, otherwise a
    /// new row is inserted. The whole reconciliation commits or rolls back
    /// together, so readers never observe a half-synced kind.
    pub async fn sync_for_kind(
        &self,
        kind: IssueKind,
        detected: &[CreateIssue],
    ) -> Result<IssueSyncOutcome, PersistenceError> {
        let to_persistence = |source| PersistenceError::Issues {
            count: detected.len(),
            source,
        };

        let mut outcome = IssueSyncOutcome::default();
        let mut tx = self.pool.begin().await.map_err(to_persistence)?;

        let open_keys: Vec<String> = sqlx::query_scalar(
            "SELECT issue_key FROM media_issues WHERE kind = ?1 AND resolved = 0 ORDER BY issue_key",
        )
        .bind(kind.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(to_persistence)?;

        let detected_keys: HashSet<&str> =
            detected.iter().map(|issue| issue.issue_key.as_str()).collect();

        for stale_key in open_keys.iter().filter(|key| !detected_keys.contains(key.as_str())) {
            let result = sqlx::query(
                "UPDATE media_issues SET resolved = 1, resolved_at = ?1 WHERE issue_key = ?2 AND resolved = 0",
            )
            .bind(now_iso8601())
            .bind(stale_key)
            .execute(&mut *tx)
            .await
            .map_err(to_persistence)?;
            outcome.resolved += result.rows_affected();
        }

        for issue in detected {
            let file_paths_json = vec_to_json(&issue.file_paths);

            let updated = sqlx::query(
                r#"
                UPDATE media_issues SET
                    severity = ?1,
                    file_paths = ?2,
                    show_title = ?3,
                    season = ?4,
                    episode = ?5,
                    detail = ?6,
                    reclaimable_bytes = ?7,
                    canonical_path = ?8
                WHERE issue_key = ?9 AND resolved = 0
                "#,
            )
            .bind(issue.severity.as_str())
            .bind(&file_paths_json)
            .bind(&issue.show_title)
            .bind(issue.season)
            .bind(issue.episode)
            .bind(&issue.detail)
            .bind(issue.reclaimable_bytes)
            .bind(&issue.canonical_path)
            .bind(&issue.issue_key)
            .execute(&mut *tx)
            .await
            .map_err(to_persistence)?;

            if updated.rows_affected() > 0 {
                outcome.refreshed += 1;
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO media_issues (
                    id, kind, severity, issue_key, file_paths,
                    show_title, season, episode, detail,
                    reclaimable_bytes, canonical_path,
                    resolved, resolved_at, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, NULL, ?12)
                "#,
            )
            .bind(uuid_to_str(Uuid::new_v4()))
            .bind(issue.kind.as_str())
            .bind(issue.severity.as_str())
            .bind(&issue.issue_key)
            .bind(&file_paths_json)
            .bind(&issue.show_title)
            .bind(issue.season)
            .bind(issue.episode)
            .bind(&issue.detail)
            .bind(issue.reclaimable_bytes)
            .bind(&issue.canonical_path)
            .bind(now_iso8601())
            .execute(&mut *tx)
            .await
            .map_err(to_persistence)?;
            outcome.created += 1;
        }

        tx.commit().await.map_err(to_persistence)?;
        Ok(outcome)
    }

    /// List issues matching a filter. Open issues only unless the filter
    /// asks for resolved history too.
    pub async fn list(&self, filter: &IssueFilter) -> Result<Vec<IssueRecord>, PersistenceError> {
        let mut sql = String::from("SELECT * FROM media_issues WHERE 1=1");
        if filter.kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        if !filter.include_resolved {
            sql.push_str(" AND resolved = 0");
        }
        sql.push_str(" ORDER BY kind, issue_key");

        let mut query = sqlx::query_as::<_, IssueRecord>(&sql);
        if let Some(kind) = filter.kind {
            query = query.bind(kind.as_str());
        }

        query
            .fetch_all(&self.pool)
            .await
            .map_err(|source| PersistenceError::Query { source })
    }

    /// Number of open issues of one kind
    pub async fn count_open_by_kind(&self, kind: IssueKind) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM media_issues WHERE kind = ?1 AND resolved = 0",
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
