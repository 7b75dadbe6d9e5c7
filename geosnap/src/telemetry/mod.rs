//! Pipeline telemetry.
//!
//! Lock-free atomic counters over pipeline events, with a point-in-time
//! snapshot for display:
//!
//! ```text
//! Pipeline stages ────► PipelineMetrics ────► TelemetrySnapshot ────► Views
//!                       (atomic counters)    (point-in-time copy)    (CLI, server)
//! ```

mod metrics;
mod snapshot;

pub use metrics::PipelineMetrics;
pub use snapshot::TelemetrySnapshot;
