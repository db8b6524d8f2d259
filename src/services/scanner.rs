//! Library scanner service
//!
//! Walks the configured roots, fingerprints every media file through a
//! bounded worker pool, and persists records in fixed-size batches.
//!
//! Concurrency shape: workers only extract. Each worker sends its outcome
//! over a channel to the coordinator, which is the only task that writes
//! to the store. One batch is one transaction; a failed batch is retried
//! once and then fails the whole run with the unpersisted count, so
//! nothing is ever silently dropped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use glob::{MatchOptions, Pattern};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::{ConfigError, ScanSettings};
use crate::db::{CatalogStore, CreateMediaFile, MediaType};
use crate::services::extractor::{ExtractionError, MetadataExtractor};
use crate::services::progress::{JobGate, JobHandle, Phase, RunSummary};

/// Wait before retrying a failed batch write
const BATCH_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Case-insensitive, so "*Sample*" and "*sample*" behave alike
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A running scan. Watch it through the handle, or wait for the summary.
#[derive(Debug)]
pub struct ScanJob {
    handle: JobHandle,
    task: JoinHandle<Result<RunSummary>>,
}

impl ScanJob {
    pub fn handle(&self) -> JobHandle {
        self.handle.clone()
    }

    /// Wait for the scan to finish and return its summary
    pub async fn wait(self) -> Result<RunSummary> {
        self.task.await.context("scan task aborted")?
    }
}

/// Scanner service for cataloging media files
#[derive(Clone)]
pub struct ScannerService {
    store: Arc<dyn CatalogStore>,
    extractor: Arc<MetadataExtractor>,
    settings: ScanSettings,
    gate: JobGate,
}

impl ScannerService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        extractor: Arc<MetadataExtractor>,
        settings: ScanSettings,
        gate: JobGate,
    ) -> Self {
        Self {
            store,
            extractor,
            settings,
            gate,
        }
    }

    /// Validate the run and start scanning in the background.
    ///
    /// Every setting is checked before any filesystem or store work
    /// happens; a bad root or pattern fails here, not mid-scan. Refuses
    /// to start while another job holds the catalog.
    pub fn start_scan(&self, roots: Vec<PathBuf>, media_type: MediaType) -> Result<ScanJob> {
        if self.settings.workers == 0 {
            return Err(ConfigError::InvalidWorkerCount(self.settings.workers).into());
        }
        if self.settings.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(self.settings.batch_size).into());
        }
        if self.settings.allowed_extensions.is_empty() {
            return Err(ConfigError::EmptyExtensionList.into());
        }
        if roots.is_empty() {
            bail!("at least one scan root is required");
        }
        for root in &roots {
            if !root.is_dir() {
                return Err(ConfigError::UnreadableRoot(root.clone()).into());
            }
        }
        let patterns = compile_patterns(&self.settings.ignore_patterns)?;

        let Some(permit) = self.gate.try_acquire() else {
            bail!("another job is already running against this catalog");
        };

        let handle = JobHandle::new(Phase::Scan);
        let scanner = self.clone();
        let job_handle = handle.clone();
        let task = tokio::spawn(async move {
            let _permit = permit;
            scanner.run(roots, media_type, patterns, job_handle).await
        });

        Ok(ScanJob { handle, task })
    }

    async fn run(
        self,
        roots: Vec<PathBuf>,
        media_type: MediaType,
        patterns: Vec<Pattern>,
        handle: JobHandle,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        let candidates = self.collect_candidates(&roots, &patterns, &mut summary);
        let total = candidates.len() as u64;
        info!(total = total, media_type = %media_type, "Found media files to scan");
        handle.emit(0, total, "scanning");

        // Workers extract concurrently, bounded by the semaphore. The
        // permit is released only after the outcome is handed to the
        // coordinator, so at most `workers` files are in flight.
        let (tx, mut rx) =
            mpsc::channel::<Result<CreateMediaFile, ExtractionError>>(self.settings.workers * 2);
        let semaphore = Arc::new(Semaphore::new(self.settings.workers));

        let dispatcher = {
            let extractor = self.extractor.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                for path in candidates {
                    if handle.is_cancelled() {
                        break;
                    }
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    let extractor = extractor.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let outcome = extractor.extract(&path, media_type).await;
                        let _ = tx.send(outcome).await;
                        drop(permit);
                    });
                }
            })
        };

        // Single writer: only this loop touches the store
        let mut batch: Vec<CreateMediaFile> = Vec::with_capacity(self.settings.batch_size);
        let mut completed: u64 = 0;

        while let Some(outcome) = rx.recv().await {
            completed += 1;
            match outcome {
                Ok(record) => {
                    debug!(path = %record.path, "Extracted media file");
                    batch.push(record);
                    if batch.len() >= self.settings.batch_size {
                        match self.flush(&mut batch).await {
                            Ok(flushed) => {
                                summary.files_scanned += flushed as u64;
                                handle.emit(completed, total, "scanning");
                            }
                            Err(err) => {
                                return self.fail(&handle, completed, total, summary, err);
                            }
                        }
                    } else {
                        handle.advance(completed, total, "scanning");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable file");
                    summary.files_failed += 1;
                    handle.advance(completed, total, "scanning");
                }
            }
        }
        let _ = dispatcher.await;

        // Remainder batch
        match self.flush(&mut batch).await {
            Ok(flushed) => {
                if flushed > 0 {
                    summary.files_scanned += flushed as u64;
                    handle.emit(completed, total, "scanning");
                }
            }
            Err(err) => {
                return self.fail(&handle, completed, total, summary, err);
            }
        }

        let status = if handle.is_cancelled() { "cancelled" } else { "complete" };
        handle.finish(completed, total, status, summary);
        info!(
            scanned = summary.files_scanned,
            failed = summary.files_failed,
            status = status,
            "Scan finished"
        );
        Ok(summary)
    }

    /// Walk every root, applying the extension allow-list and ignore
    /// patterns. Unreadable entries are counted as failures and skipped;
    /// overlapping roots yield each file once.
    fn collect_candidates(
        &self,
        roots: &[PathBuf],
        patterns: &[Pattern],
        summary: &mut RunSummary,
    ) -> Vec<PathBuf> {
        let allowed: HashSet<String> = self
            .settings
            .allowed_extensions
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect();

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut candidates = Vec::new();

        for root in roots {
            for entry in WalkDir::new(root).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(error = %err, "Skipping unreadable directory entry");
                        summary.files_failed += 1;
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();

                let has_allowed_ext = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| allowed.contains(&ext.to_lowercase()))
                    .unwrap_or(false);
                if !has_allowed_ext || is_ignored(path, root, patterns) {
                    continue;
                }

                if seen.insert(path.to_path_buf()) {
                    candidates.push(path.to_path_buf());
                }
            }
        }

        candidates
    }

    /// Persist one batch in one transaction, retrying once
    async fn flush(&self, batch: &mut Vec<CreateMediaFile>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        if let Err(first) = self.store.upsert_files(batch).await {
            warn!(error = %first, records = batch.len(), "Batch persist failed, retrying once");
            tokio::time::sleep(BATCH_RETRY_DELAY).await;
            self.store.upsert_files(batch).await?;
        }
        let flushed = batch.len();
        batch.clear();
        Ok(flushed)
    }

    /// Terminal path for an unrecoverable persistence failure. The failed
    /// batch was never split, so its full size is known unpersisted.
    fn fail(
        &self,
        handle: &JobHandle,
        completed: u64,
        total: u64,
        summary: RunSummary,
        err: anyhow::Error,
    ) -> Result<RunSummary> {
        error!(error = %err, "Scan failed with records unpersisted");
        handle.cancel();
        handle.finish(completed, total, &format!("failed: {}", err), summary);
        Err(err)
    }
}

fn compile_patterns(raw: &[String]) -> Result<Vec<Pattern>> {
    raw.iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|source| {
                ConfigError::InvalidIgnorePattern {
                    pattern: pattern.clone(),
                    source,
                }
                .into()
            })
        })
        .collect()
}

/// A pattern may match either the bare file name or the path relative to
/// the scan root, so "*sample*" and "extras/*" both work.
fn is_ignored(path: &Path, root: &Path, patterns: &[Pattern]) -> bool {
    let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
    let relative = path.strip_prefix(root).unwrap_or(path).to_string_lossy();

    patterns.iter().any(|pattern| {
        pattern.matches_with(name, GLOB_OPTIONS) || pattern.matches_with(&relative, GLOB_OPTIONS)
    })
}
