//! Curator - media library scanner and analyzer
//!
//! Walks media roots into a SQLite catalog, then runs detection passes
//! over it: duplicate groups, quality shortfalls, missing episodes.
//! One command per invocation; progress streams to the log.

mod cli;
mod config;
mod db;
mod services;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Command;
use crate::config::Config;
use crate::db::{CatalogStore, Database};
use crate::services::{
    AnalyzerService, FfprobeClient, JobGate, JobHandle, MetadataExtractor, ScannerService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let command = Command::from_args()?;
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Curator");

    let db = Database::connect(&config.database_path).await?;
    db.init_schema().await?;
    tracing::info!(path = %config.database_path.display(), "Catalog database ready");

    let store: Arc<dyn CatalogStore> = Arc::new(db.clone());
    let gate = JobGate::default();

    match command {
        Command::Scan { roots, media_type } => {
            let probe = Arc::new(FfprobeClient::new(config.ffprobe_path.clone()));
            if !probe.is_available().await {
                tracing::warn!(
                    ffprobe = %config.ffprobe_path,
                    "ffprobe not found; files will be cataloged without quality metadata"
                );
            }
            let extractor = Arc::new(MetadataExtractor::new(probe));
            let scanner = ScannerService::new(store, extractor, config.scan.clone(), gate);

            let job = scanner.start_scan(roots, media_type)?;
            watch(job.handle());
            let summary = job.wait().await?;
            tracing::info!(
                scanned = summary.files_scanned,
                failed = summary.files_failed,
                "Scan finished"
            );
        }
        Command::Analyze { options } => {
            let analyzer = AnalyzerService::new(store, config.thresholds.clone(), gate);

            let job = analyzer.start_analyze(options)?;
            watch(job.handle());
            let summary = job.wait().await?;
            tracing::info!(
                found = summary.issues_found,
                resolved = summary.issues_resolved,
                "Analysis finished"
            );
        }
        Command::Stats => {
            let stats = db.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// Log progress events and turn Ctrl-C into a cancellation request
fn watch(handle: JobHandle) {
    let mut events = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::info!(
                        phase = %event.phase,
                        completed = event.completed,
                        total = event.total,
                        status = %event.status,
                        "Progress"
                    );
                    if event.summary.is_some() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            handle.cancel();
        }
    });
}
