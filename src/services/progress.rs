//! Job handles and progress events
//!
//! Scan and analyze runs are long-lived jobs. Each one hands back a
//! [`JobHandle`] that callers can use to watch progress over a broadcast
//! channel, poll a snapshot, or request cancellation. Only one job may run
//! against a catalog at a time, which [`JobGate`] enforces.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};

/// Which pipeline a job belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Scan,
    Analyze,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Scan => "scan",
            Phase::Analyze => "analyze",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final accounting for a finished job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_scanned: u64,
    pub files_failed: u64,
    pub issues_found: u64,
    pub issues_resolved: u64,
}

/// One progress update. The terminal event carries the run summary and a
/// status of "complete", "cancelled", or "failed: <reason>".
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub completed: u64,
    pub total: u64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

/// Point-in-time view of a job for pollers
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub phase: Phase,
    pub completed: u64,
    pub total: u64,
    pub status: String,
    pub finished: bool,
}

#[derive(Debug)]
struct JobInner {
    phase: Phase,
    events: broadcast::Sender<ProgressEvent>,
    snapshot: RwLock<JobSnapshot>,
    cancelled: AtomicBool,
}

/// Shared handle to a running scan or analyze job
#[derive(Debug, Clone)]
pub struct JobHandle {
    inner: Arc<JobInner>,
}

impl JobHandle {
    pub(crate) fn new(phase: Phase) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(JobInner {
                phase,
                events,
                snapshot: RwLock::new(JobSnapshot {
                    phase,
                    completed: 0,
                    total: 0,
                    status: "starting".to_string(),
                    finished: false,
                }),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to progress events. Slow subscribers may miss events;
    /// the snapshot always reflects the latest state.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.inner.events.subscribe()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.inner.snapshot.read().clone()
    }

    /// Ask the job to stop. In-flight work is drained and persisted before
    /// the job reports a "cancelled" terminal event.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Update the snapshot without broadcasting an event
    pub(crate) fn advance(&self, completed: u64, total: u64, status: &str) {
        let mut snapshot = self.inner.snapshot.write();
        snapshot.completed = completed;
        snapshot.total = total;
        snapshot.status = status.to_string();
    }

    /// Update the snapshot and broadcast a progress event
    pub(crate) fn emit(&self, completed: u64, total: u64, status: &str) {
        self.advance(completed, total, status);
        // Send failures just mean nobody is listening
        let _ = self.inner.events.send(ProgressEvent {
            phase: self.inner.phase,
            completed,
            total,
            status: status.to_string(),
            summary: None,
        });
    }

    /// Broadcast the terminal event with the run summary
    pub(crate) fn finish(&self, completed: u64, total: u64, status: &str, summary: RunSummary) {
        {
            let mut snapshot = self.inner.snapshot.write();
            snapshot.completed = completed;
            snapshot.total = total;
            snapshot.status = status.to_string();
            snapshot.finished = true;
        }
        let _ = self.inner.events.send(ProgressEvent {
            phase: self.inner.phase,
            completed,
            total,
            status: status.to_string(),
            summary: Some(summary),
        });
    }
}

/// Mutual exclusion between jobs sharing one catalog. Acquiring fails fast
/// instead of queueing; the caller reports that a job is already running.
#[derive(Clone, Default)]
pub struct JobGate {
    inner: Arc<Mutex<()>>,
}

impl JobGate {
    /// Try to claim the gate. The returned guard holds it until dropped.
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        self.inner.clone().try_lock_owned().ok()
    }
}
