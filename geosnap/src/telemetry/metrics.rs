//! Atomic event counters recorded by the pipeline stages.

use std::sync::atomic::{AtomicU64, Ordering};

use super::TelemetrySnapshot;

/// Counters for one or more pipeline runs. All methods are lock-free and
/// safe to call from any thread; relaxed ordering is enough because the
/// counters are independent tallies, not synchronization points.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    scenes_matched: AtomicU64,
    exports_submitted: AtomicU64,
    export_polls: AtomicU64,
    bytes_downloaded: AtomicU64,
    artifacts_rendered: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the number of scenes matching the query.
    pub fn scenes_matched(&self, count: u64) {
        self.scenes_matched.fetch_add(count, Ordering::Relaxed);
    }

    /// Record an export submission.
    pub fn export_submitted(&self) {
        self.exports_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one poll of the export task.
    pub fn export_polled(&self) {
        self.export_polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes downloaded from artifact storage.
    pub fn bytes_downloaded(&self, bytes: u64) {
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record one rendered preview image.
    pub fn artifact_rendered(&self) {
        self.artifacts_rendered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run that produced a manifest.
    pub fn run_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a run that aborted with an error.
    pub fn run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            scenes_matched: self.scenes_matched.load(Ordering::Relaxed),
            exports_submitted: self.exports_submitted.load(Ordering::Relaxed),
            export_polls: self.export_polls.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            artifacts_rendered: self.artifacts_rendered.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
        }
    }
}
