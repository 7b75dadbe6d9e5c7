//! Point-in-time copy of the pipeline counters.

/// A consistent-enough view of [`super::PipelineMetrics`] for display.
/// Plain data; cheap to clone and pass across threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub scenes_matched: u64,
    pub exports_submitted: u64,
    pub export_polls: u64,
    pub bytes_downloaded: u64,
    pub artifacts_rendered: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
}

impl TelemetrySnapshot {
    /// Total runs observed, successful or not.
    pub fn runs_total(&self) -> u64 {
        self.runs_completed + self.runs_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_total_sums_both_outcomes() {
        let snapshot = TelemetrySnapshot {
            runs_completed: 3,
            runs_failed: 2,
            ..Default::default()
        };
        assert_eq!(snapshot.runs_total(), 5);
    }
}
