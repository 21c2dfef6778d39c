//! Progress reporting for formula builds.
//!
//! The executor emits events through a callback; rendering (spinners,
//! progress bars, plain text) is the caller's concern.

use std::sync::Arc;

use crate::executor::Phase;

/// Events emitted during an install run.
#[derive(Debug, Clone)]
pub enum BuildProgress {
    /// Dependency resolution finished; `count` formulas will be processed.
    Planned { count: usize },
    /// A formula entered a new phase of its build.
    PhaseChanged { formula: String, phase: Phase },
    /// The download began; `total_bytes` is the Content-Length when the
    /// server sent one.
    DownloadStarted {
        formula: String,
        url: String,
        total_bytes: Option<u64>,
    },
    /// Bytes received so far for an in-flight download.
    DownloadProgress {
        formula: String,
        downloaded: u64,
        total_bytes: Option<u64>,
    },
    /// The archive is fully on disk.
    DownloadCompleted { formula: String, total_bytes: u64 },
    /// The source archive was already cached; no network access needed.
    CacheHit { formula: String },
    /// An external build step is about to run.
    StepStarted { formula: String, step: String },
    /// A build step finished successfully.
    StepFinished { formula: String, step: String },
    /// A formula was skipped because it is already installed.
    AlreadyInstalled { formula: String },
    /// A formula finished installing.
    Installed { formula: String, version: String },
    /// The post-install probe passed.
    TestPassed { formula: String },
}

pub type ProgressCallback = dyn Fn(BuildProgress) + Send + Sync;

/// A callback that discards all events.
pub fn null_progress() -> Arc<ProgressCallback> {
    Arc::new(|_| {})
}
