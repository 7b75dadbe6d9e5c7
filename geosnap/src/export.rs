//! Export job management - submit the remote task and poll it to a
//! terminal state.
//!
//! The state machine is `PENDING -> RUNNING -> {COMPLETED | failure}`.
//! Transitions are driven only by polling the platform; the loop blocks
//! the calling thread between polls through the injectable [`Delay`], so
//! tests run it without wall-clock waiting. One submission per run, no
//! resubmission of a failed task.
//!
//! Output names are `{prefix}_{unix_seconds}`, unique per run at
//! one-second granularity. Two runs submitting within the same second can
//! collide on the name; runs are deliberately uncoordinated (single-job
//! batch design) and callers that need stronger isolation must namespace
//! their own prefixes.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::control::{CancelToken, Clock, Delay};
use crate::imagery::{ImageStack, RegionOfInterest};
use crate::platform::{ExportRequest, ImageryPlatform, PlatformError, TaskState};

/// A submitted export task. State is updated only by [`ExportJobManager::wait`].
#[derive(Debug, Clone)]
pub struct ExportTask {
    /// Platform-assigned task id.
    pub id: String,
    /// Human-readable description sent with the submission.
    pub description: String,
    /// Remote output name (without extension).
    pub output_name: String,
    /// Last observed state.
    pub state: TaskState,
}

/// Errors raised while driving an export to completion.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The submission request failed; no task was created.
    #[error("export submission failed: {0}")]
    Submit(PlatformError),

    /// A poll request failed; the remote task may still be running.
    #[error("export poll failed: {0}")]
    Poll(PlatformError),

    /// The task reached a terminal state other than COMPLETED.
    #[error("export task ended in state {state}{}", .detail.as_deref().map(|d| format!(": {}", d)).unwrap_or_default())]
    Failed { state: String, detail: Option<String> },

    /// Cancellation was requested while waiting.
    #[error("export cancelled while waiting for task {task_id}")]
    Cancelled { task_id: String },

    /// The configured poll deadline expired before a terminal state.
    #[error("export task {task_id} not terminal after {waited_secs}s")]
    TimedOut { task_id: String, waited_secs: u64 },
}

/// Submits exports and drives them to a terminal state.
pub struct ExportJobManager {
    platform: Arc<dyn ImageryPlatform>,
    config: ExportConfig,
    clock: Arc<dyn Clock>,
    delay: Arc<dyn Delay>,
    cancel: CancelToken,
}

impl ExportJobManager {
    pub fn new(
        platform: Arc<dyn ImageryPlatform>,
        config: ExportConfig,
        clock: Arc<dyn Clock>,
        delay: Arc<dyn Delay>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            platform,
            config,
            clock,
            delay,
            cancel,
        }
    }

    /// Submit the stack for export. Returns the task handle in PENDING
    /// state. The output name is derived from the configured prefix and
    /// the submission's wall-clock timestamp.
    pub fn submit(
        &self,
        stack: &ImageStack,
        region: &RegionOfInterest,
    ) -> Result<ExportTask, ExportError> {
        let output_name = format!(
            "{}_{}",
            self.config.prefix,
            self.clock.now_utc().timestamp()
        );
        let request = ExportRequest {
            description: self.config.description.clone(),
            folder: self.config.folder.clone(),
            output_name: output_name.clone(),
            stack: stack.clone(),
            region: *region,
            scale_m: self.config.scale_m,
            max_pixels: self.config.max_pixels,
        };

        let id = self
            .platform
            .submit_export(&request)
            .map_err(ExportError::Submit)?;

        info!(task_id = %id, output_name = %output_name, "export submitted");

        Ok(ExportTask {
            id,
            description: request.description,
            output_name,
            state: TaskState::Pending,
        })
    }

    /// Poll the task to a terminal state.
    pub fn wait(&self, task: &mut ExportTask) -> Result<(), ExportError> {
        self.wait_observed(task, &|_, _| {})
    }

    /// Poll the task to a terminal state, invoking `observer` with the
    /// poll count and observed state after every poll.
    ///
    /// The optional deadline counts accumulated sleep time, not wall
    /// clock, so a mocked delay exercises the timeout deterministically.
    /// With no deadline configured a stuck remote task polls forever;
    /// cancellation is the only other way out.
    pub fn wait_observed(
        &self,
        task: &mut ExportTask,
        observer: &(dyn Fn(u32, &TaskState) + Sync),
    ) -> Result<(), ExportError> {
        let mut waited = Duration::ZERO;
        let mut polls: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                warn!(task_id = %task.id, polls, "export wait cancelled");
                return Err(ExportError::Cancelled {
                    task_id: task.id.clone(),
                });
            }

            if let Some(deadline) = self.config.poll_timeout {
                if waited >= deadline {
                    warn!(task_id = %task.id, waited_secs = waited.as_secs(), "export poll deadline expired");
                    return Err(ExportError::TimedOut {
                        task_id: task.id.clone(),
                        waited_secs: waited.as_secs(),
                    });
                }
            }

            let status = self
                .platform
                .task_status(&task.id)
                .map_err(ExportError::Poll)?;
            polls += 1;
            task.state = status.state.clone();
            observer(polls, &task.state);
            debug!(task_id = %task.id, state = %task.state, polls, "export polled");

            match &task.state {
                TaskState::Pending | TaskState::Running => {}
                TaskState::Completed => {
                    info!(task_id = %task.id, polls, "export completed");
                    return Ok(());
                }
                terminal => {
                    return Err(ExportError::Failed {
                        state: terminal.to_string(),
                        detail: status.detail,
                    });
                }
            }

            self.delay.sleep(self.config.poll_interval);
            waited += self.config.poll_interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::tests::RecordingDelay;
    use crate::control::FixedClock;
    use crate::platform::tests::ScriptedPlatform;
    use crate::platform::SceneSummary;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn manager(
        states: Vec<TaskState>,
        config: ExportConfig,
        cancel: CancelToken,
    ) -> (ExportJobManager, Arc<ScriptedPlatform>, Arc<RecordingDelay>) {
        let platform = Arc::new(ScriptedPlatform::new(
            SceneSummary {
                count: 1,
                earliest_ms: 1_700_000_000_000,
            },
            states,
        ));
        let delay = Arc::new(RecordingDelay::new());
        let manager = ExportJobManager::new(
            platform.clone(),
            config,
            Arc::new(FixedClock::at(1_700_000_000)),
            delay.clone(),
            cancel,
        );
        (manager, platform, delay)
    }

    fn submitted(manager: &ExportJobManager) -> ExportTask {
        manager
            .submit(
                &ImageStack::sentinel2_default(),
                &RegionOfInterest {
                    center_lat: 12.34,
                    center_lon: 56.78,
                    radius_m: 15_000.0,
                },
            )
            .unwrap()
    }

    #[test]
    fn test_submit_derives_timestamped_name() {
        let (manager, platform, _) = manager(vec![], ExportConfig::default(), CancelToken::new());
        let task = submitted(&manager);

        assert_eq!(task.output_name, "Site_Export_1700000000");
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(platform.submission_count(), 1);
        assert_eq!(
            platform.submissions.lock().unwrap()[0].output_name,
            "Site_Export_1700000000"
        );
    }

    #[test]
    fn test_wait_runs_to_completion_without_real_sleeping() {
        let (manager, _, delay) = manager(
            vec![TaskState::Pending, TaskState::Running, TaskState::Completed],
            ExportConfig::default(),
            CancelToken::new(),
        );
        let mut task = submitted(&manager);

        manager.wait(&mut task).unwrap();

        assert_eq!(task.state, TaskState::Completed);
        // One sleep after each non-terminal poll.
        assert_eq!(delay.sleep_count(), 2);
        assert_eq!(
            delay.slept.lock().unwrap()[0],
            Duration::from_secs(10),
            "sleeps use the configured interval"
        );
    }

    #[test]
    fn test_observer_sees_each_state() {
        let (manager, _, _) = manager(
            vec![TaskState::Pending, TaskState::Running, TaskState::Completed],
            ExportConfig::default(),
            CancelToken::new(),
        );
        let mut task = submitted(&manager);
        let observed = AtomicU32::new(0);

        manager
            .wait_observed(&mut task, &|polls, _state| {
                observed.store(polls, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(observed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failed_state_errors_with_state_string() {
        let (manager, _, delay) = manager(
            vec![TaskState::Pending, TaskState::Failed],
            ExportConfig::default(),
            CancelToken::new(),
        );
        let mut task = submitted(&manager);

        let err = manager.wait(&mut task).unwrap_err();
        assert!(matches!(err, ExportError::Failed { ref state, .. } if state == "FAILED"));
        assert_eq!(delay.sleep_count(), 1, "no sleep after the terminal poll");
    }

    #[test]
    fn test_unknown_terminal_state_fails() {
        let (manager, _, _) = manager(
            vec![TaskState::Other("EXPIRED".to_string())],
            ExportConfig::default(),
            CancelToken::new(),
        );
        let mut task = submitted(&manager);

        let err = manager.wait(&mut task).unwrap_err();
        assert!(matches!(err, ExportError::Failed { ref state, .. } if state == "EXPIRED"));
    }

    #[test]
    fn test_cancellation_stops_the_loop_before_polling() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let (manager, platform, _) = manager(
            vec![TaskState::Pending],
            ExportConfig::default(),
            cancel,
        );
        let mut task = submitted(&manager);

        let err = manager.wait(&mut task).unwrap_err();
        assert!(matches!(err, ExportError::Cancelled { .. }));
        // The scripted state was never consumed.
        assert_eq!(platform.states.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_poll_deadline_expires_deterministically() {
        let mut config = ExportConfig::default();
        config.poll_timeout = Some(Duration::from_secs(15));
        let (manager, _, delay) = manager(
            vec![TaskState::Pending, TaskState::Pending, TaskState::Pending],
            config,
            CancelToken::new(),
        );
        let mut task = submitted(&manager);

        // Accumulated sleep: 0s (poll), 10s (poll), 20s >= 15s -> timeout.
        let err = manager.wait(&mut task).unwrap_err();
        assert!(matches!(err, ExportError::TimedOut { waited_secs: 20, .. }));
        assert_eq!(delay.sleep_count(), 2);
    }

    #[test]
    fn test_no_deadline_by_default() {
        let states: Vec<TaskState> = std::iter::repeat(TaskState::Running)
            .take(50)
            .chain(std::iter::once(TaskState::Completed))
            .collect();
        let (manager, _, delay) = manager(states, ExportConfig::default(), CancelToken::new());
        let mut task = submitted(&manager);

        manager.wait(&mut task).unwrap();
        assert_eq!(delay.sleep_count(), 50);
    }
}
