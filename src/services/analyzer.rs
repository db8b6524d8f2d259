//! Analyzer service
//!
//! Runs the detection passes over a snapshot of the catalog and syncs the
//! results into the issue table. Each pass reads the same snapshot, so a
//! run is internally consistent even while files change on disk. Issues
//! that no longer reproduce are marked resolved, never deleted; the issue
//! history survives every run.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::QualityThresholds;
use crate::db::{CatalogStore, CreateIssue, FileFilter, IssueKind, MediaFileRecord};
use crate::services::progress::{JobGate, JobHandle, Phase, RunSummary};
use crate::services::{completeness, duplicate_detector, quality_assessor};

/// Wait before retrying a failed issue sync
const SYNC_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Which detection passes to run. Defaults to all of them.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzeOptions {
    pub duplicates: bool,
    pub quality: bool,
    pub completeness: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            duplicates: true,
            quality: true,
            completeness: true,
        }
    }
}

impl AnalyzeOptions {
    fn enabled_count(&self) -> u64 {
        [self.duplicates, self.quality, self.completeness]
            .iter()
            .filter(|enabled| **enabled)
            .count() as u64
    }
}

/// A running analysis. Watch it through the handle, or wait for the summary.
#[derive(Debug)]
pub struct AnalyzeJob {
    handle: JobHandle,
    task: JoinHandle<Result<RunSummary>>,
}

impl AnalyzeJob {
    pub fn handle(&self) -> JobHandle {
        self.handle.clone()
    }

    /// Wait for the analysis to finish and return its summary
    pub async fn wait(self) -> Result<RunSummary> {
        self.task.await.context("analyze task aborted")?
    }
}

/// Analyzer service for detecting catalog issues
#[derive(Clone)]
pub struct AnalyzerService {
    store: Arc<dyn CatalogStore>,
    thresholds: QualityThresholds,
    gate: JobGate,
}

impl AnalyzerService {
    pub fn new(store: Arc<dyn CatalogStore>, thresholds: QualityThresholds, gate: JobGate) -> Self {
        Self {
            store,
            thresholds,
            gate,
        }
    }

    /// Start the enabled passes in the background. Refuses to start while
    /// another job holds the catalog.
    pub fn start_analyze(&self, options: AnalyzeOptions) -> Result<AnalyzeJob> {
        if options.enabled_count() == 0 {
            bail!("at least one analysis pass must be enabled");
        }
        let Some(permit) = self.gate.try_acquire() else {
            bail!("another job is already running against this catalog");
        };

        let handle = JobHandle::new(Phase::Analyze);
        let analyzer = self.clone();
        let job_handle = handle.clone();
        let task = tokio::spawn(async move {
            let _permit = permit;
            analyzer.run(options, job_handle).await
        });

        Ok(AnalyzeJob { handle, task })
    }

    async fn run(self, options: AnalyzeOptions, handle: JobHandle) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let total = options.enabled_count();
        let mut completed: u64 = 0;
        handle.emit(0, total, "analyzing");

        // One snapshot for every pass
        let files = match self.store.query_files(&FileFilter::default()).await {
            Ok(files) => files,
            Err(err) => return self.fail(&handle, completed, total, summary, err.into()),
        };
        info!(files = files.len(), "Analyzing catalog snapshot");

        let passes: [(bool, IssueKind); 3] = [
            (options.duplicates, IssueKind::Duplicate),
            (options.quality, IssueKind::LowRes),
            (options.completeness, IssueKind::MissingEpisode),
        ];

        for (enabled, kind) in passes {
            if !enabled {
                continue;
            }
            if handle.is_cancelled() {
                break;
            }

            let detected = self.detect(kind, &files);
            let outcome = match self.sync(kind, &detected).await {
                Ok(outcome) => outcome,
                Err(err) => return self.fail(&handle, completed, total, summary, err),
            };
            info!(
                kind = %kind,
                detected = detected.len(),
                created = outcome.created,
                refreshed = outcome.refreshed,
                resolved = outcome.resolved,
                "Analysis pass finished"
            );
            summary.issues_found += detected.len() as u64;
            summary.issues_resolved += outcome.resolved;

            completed += 1;
            handle.emit(completed, total, kind.as_str());
        }

        let status = if handle.is_cancelled() { "cancelled" } else { "complete" };
        handle.finish(completed, total, status, summary);
        info!(
            found = summary.issues_found,
            resolved = summary.issues_resolved,
            status = status,
            "Analysis finished"
        );
        Ok(summary)
    }

    fn detect(&self, kind: IssueKind, files: &[MediaFileRecord]) -> Vec<CreateIssue> {
        match kind {
            IssueKind::Duplicate => duplicate_detector::detect(files),
            IssueKind::LowRes => quality_assessor::assess(files, &self.thresholds),
            IssueKind::MissingEpisode => completeness::detect(files),
        }
    }

    /// Sync one pass in one transaction, retrying once
    async fn sync(
        &self,
        kind: IssueKind,
        detected: &[CreateIssue],
    ) -> Result<crate::db::IssueSyncOutcome> {
        match self.store.upsert_issues(kind, detected).await {
            Ok(outcome) => Ok(outcome),
            Err(first) => {
                warn!(error = %first, kind = %kind, "Issue sync failed, retrying once");
                tokio::time::sleep(SYNC_RETRY_DELAY).await;
                Ok(self.store.upsert_issues(kind, detected).await?)
            }
        }
    }

    fn fail(
        &self,
        handle: &JobHandle,
        completed: u64,
        total: u64,
        summary: RunSummary,
        err: anyhow::Error,
    ) -> Result<RunSummary> {
        error!(error = %err, "Analysis failed");
        handle.cancel();
        handle.finish(completed, total, &format!("failed: {}", err), summary);
        Err(err)
    }
}
