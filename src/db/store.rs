//! Catalog store surface shared by the scanner and the analyzer
//!
//! Both pipelines talk to the catalog through this trait rather than the
//! concrete repositories, which keeps the persistence boundary narrow and
//! lets tests substitute failing or flaky stores. Every method is one
//! transaction: a batch of file upserts or an issue reconciliation either
//! lands completely or not at all.

use async_trait::async_trait;

use crate::db::Database;
use crate::db::issues::{CreateIssue, IssueFilter, IssueKind, IssueRecord, IssueSyncOutcome};
use crate::db::media_files::{CreateMediaFile, FileFilter, MediaFileRecord};

/// Batch-level persistence failure. Carries how many records were in the
/// failed call so callers can report exactly what is known unpersisted.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to persist batch of {count} file records: {source}")]
    Files {
        count: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to sync {count} detected issues: {source}")]
    Issues {
        count: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("catalog query failed: {source}")]
    Query {
        #[source]
        source: sqlx::Error,
    },
}

impl PersistenceError {
    /// Number of records the failed call was carrying
    pub fn record_count(&self) -> usize {
        match self {
            PersistenceError::Files { count, .. } => *count,
            PersistenceError::Issues { count, .. } => *count,
            PersistenceError::Query { .. } => 0,
        }
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or refresh file records, keyed by path, in one transaction
    async fn upsert_files(&self, records: &[CreateMediaFile]) -> Result<(), PersistenceError>;

    /// Read file records matching a filter
    async fn query_files(
        &self,
        filter: &FileFilter,
    ) -> Result<Vec<MediaFileRecord>, PersistenceError>;

    /// Reconcile open issues of one kind against a detection pass, in one
    /// transaction. Stale open issues are marked resolved, never deleted.
    async fn upsert_issues(
        &self,
        kind: IssueKind,
        detected: &[CreateIssue],
    ) -> Result<IssueSyncOutcome, PersistenceError>;

    /// Read issues matching a filter
    async fn query_issues(&self, filter: &IssueFilter)
    -> Result<Vec<IssueRecord>, PersistenceError>;
}

#[async_trait]
impl CatalogStore for Database {
    async fn upsert_files(&self, records: &[CreateMediaFile]) -> Result<(), PersistenceError> {
        self.media_files().upsert_batch(records).await
    }

    async fn query_files(
        &self,
        filter: &FileFilter,
    ) -> Result<Vec<MediaFileRecord>, PersistenceError> {
        self.media_files().list(filter).await
    }

    async fn upsert_issues(
        &self,
        kind: IssueKind,
        detected: &[CreateIssue],
    ) -> Result<IssueSyncOutcome, PersistenceError> {
        self.issues().sync_for_kind(kind, detected).await
    }

    async fn query_issues(
        &self,
        filter: &IssueFilter,
    ) -> Result<Vec<IssueRecord>, PersistenceError> {
        self.issues().list(filter).await
    }
}
