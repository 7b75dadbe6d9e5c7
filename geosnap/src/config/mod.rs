//! Pipeline configuration.
//!
//! Every fixed constant of the export pipeline lives here as an explicit,
//! immutable configuration structure passed into each stage, so tests can
//! vary them without touching process-wide state. `PipelineConfig` combines
//! the per-stage configs the same way the pipeline itself is layered:
//! scene query → export job → rendering.

mod file;

pub use file::{ConfigError, ConfigFile, DEFAULT_SERVER_PORT};

use std::path::PathBuf;
use std::time::Duration;

/// Default region-of-interest radius in meters.
pub const DEFAULT_ROI_RADIUS_M: f64 = 15_000.0;

/// Default scene date window (inclusive start, exclusive end).
pub const DEFAULT_START_DATE: &str = "2024-06-01";
pub const DEFAULT_END_DATE: &str = "2024-06-30";

/// Default hard ceiling on scene cloud cover, in percent.
pub const DEFAULT_MAX_CLOUD_PCT: f64 = 10.0;

/// Default source collection identifier.
pub const DEFAULT_COLLECTION: &str = "COPERNICUS/S2_SR";

/// Default ground-sample distance for the export, in meters.
pub const DEFAULT_SCALE_M: u32 = 30;

/// Default maximum-pixel ceiling for the export (1e13).
pub const DEFAULT_MAX_PIXELS: u64 = 10_000_000_000_000;

/// Default interval between export task polls, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Default export output-name prefix.
pub const DEFAULT_EXPORT_PREFIX: &str = "Site_Export";

/// Default export task description.
pub const DEFAULT_EXPORT_DESCRIPTION: &str = "Sentinel2_Export";

/// Default remote folder receiving export output.
pub const DEFAULT_EXPORT_FOLDER: &str = "EarthEngineExports";

/// Default divisor converting surface reflectance to [0, 1] for RGB output.
///
/// Sentinel-2 surface-reflectance bands are scaled integers; dividing by
/// 3000 and clipping gives a fixed linear stretch that is reproducible
/// across runs on the same sensor, unlike adaptive (percentile) stretches.
pub const DEFAULT_REFLECTANCE_DIVISOR: f64 = 3000.0;

/// Scene query configuration: which source scenes qualify.
#[derive(Debug, Clone)]
pub struct SceneQueryConfig {
    /// Region-of-interest radius in meters.
    pub roi_radius_m: f64,

    /// Inclusive start of the acquisition window (`YYYY-MM-DD`).
    pub start_date: String,

    /// Exclusive end of the acquisition window (`YYYY-MM-DD`).
    pub end_date: String,

    /// Hard ceiling on scene cloud cover, in percent. Scenes at or above
    /// this value are excluded, not down-ranked.
    pub max_cloud_pct: f64,

    /// Source collection identifier on the imagery platform.
    pub collection: String,
}

impl Default for SceneQueryConfig {
    fn default() -> Self {
        Self {
            roi_radius_m: DEFAULT_ROI_RADIUS_M,
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            max_cloud_pct: DEFAULT_MAX_CLOUD_PCT,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

/// Export job configuration: naming, resolution, and polling policy.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Output-name prefix; the submission timestamp is appended for
    /// per-run uniqueness at one-second granularity.
    pub prefix: String,

    /// Task description sent with the submission.
    pub description: String,

    /// Remote folder receiving the export output.
    pub folder: String,

    /// Ground-sample distance in meters.
    pub scale_m: u32,

    /// Maximum-pixel ceiling for the export.
    pub max_pixels: u64,

    /// Interval between task-state polls.
    pub poll_interval: Duration,

    /// Overall poll deadline. `None` preserves the unbounded wait; when
    /// set, expiry fails the run with a timeout error (no retry).
    pub poll_timeout: Option<Duration>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_EXPORT_PREFIX.to_string(),
            description: DEFAULT_EXPORT_DESCRIPTION.to_string(),
            folder: DEFAULT_EXPORT_FOLDER.to_string(),
            scale_m: DEFAULT_SCALE_M,
            max_pixels: DEFAULT_MAX_PIXELS,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_timeout: None,
        }
    }
}

/// Rendering configuration: the fixed numerical policy for preview images.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Reflectance divisor for the RGB linear stretch.
    pub reflectance_divisor: f64,

    /// Display range for NDVI rendering (values are clamped to this).
    pub ndvi_range: (f32, f32),

    /// Display range for NDBI rendering.
    pub ndbi_range: (f32, f32),
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            reflectance_divisor: DEFAULT_REFLECTANCE_DIVISOR,
            ndvi_range: (-0.2, 0.8),
            ndbi_range: (-0.5, 0.5),
        }
    }
}

/// Combined pipeline configuration passed to [`crate::pipeline::ExportPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Scene query settings.
    pub query: SceneQueryConfig,

    /// Export job settings.
    pub export: ExportConfig,

    /// Rendering settings.
    pub render: RenderConfig,

    /// Local directory receiving downloaded rasters and rendered previews.
    /// Created on first download if absent; append-only across runs.
    pub downloads_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            query: SceneQueryConfig::default(),
            export: ExportConfig::default(),
            render: RenderConfig::default(),
            downloads_dir: PathBuf::from("downloads"),
        }
    }
}

impl PipelineConfig {
    /// Create a config with defaults and the given downloads directory.
    pub fn new(downloads_dir: PathBuf) -> Self {
        Self {
            downloads_dir,
            ..Self::default()
        }
    }

    /// Set the region-of-interest radius in meters.
    pub fn with_roi_radius_m(mut self, radius_m: f64) -> Self {
        self.query.roi_radius_m = radius_m;
        self
    }

    /// Set the acquisition date window.
    pub fn with_date_window(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.query.start_date = start.into();
        self.query.end_date = end.into();
        self
    }

    /// Set the cloud-cover ceiling in percent.
    pub fn with_max_cloud_pct(mut self, pct: f64) -> Self {
        self.query.max_cloud_pct = pct;
        self
    }

    /// Set the source collection identifier.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.query.collection = collection.into();
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.export.poll_interval = interval;
        self
    }

    /// Set (or clear) the overall poll deadline.
    pub fn with_poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.export.poll_timeout = timeout;
        self
    }

    /// Set the export output-name prefix.
    pub fn with_export_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.export.prefix = prefix.into();
        self
    }

    /// Set the downloads directory.
    pub fn with_downloads_dir(mut self, dir: PathBuf) -> Self {
        self.downloads_dir = dir;
        self
    }
}
