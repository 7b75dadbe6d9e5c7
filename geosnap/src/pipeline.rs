//! The export pipeline - strictly sequential orchestration of all stages.
//!
//! ```text
//! resolve ─► scene check ─► submit ─► poll ─► download ─► decode ─► render ─► manifest
//! ```
//!
//! Every stage blocks until its predecessor's output is available, and
//! the first error aborts the run; there is no local recovery, retry, or
//! partial-result emission. The only suspension point with unbounded
//! duration is the export poll loop; the [`CancelToken`] is the caller's
//! abort handle for it.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::PipelineConfig;
use crate::control::{CancelToken, Clock, Delay, SystemClock, ThreadDelay};
use crate::export::{ExportError, ExportJobManager};
use crate::geocode::{GeocodeError, Geocoder};
use crate::imagery::{self, ImageStack, RegionOfInterest, SceneQuery};
use crate::manifest::{Coords, Manifest, ManifestError, PngSet};
use crate::platform::{ImageryPlatform, PlatformError};
use crate::raster::{ConvertError, RasterBands};
use crate::render::{ArtifactKind, RasterConverter, VisualArtifact};
use crate::storage::{ArtifactFetcher, ArtifactStore, StoreError, GEOTIFF_MEDIA_TYPE};
use crate::telemetry::PipelineMetrics;

/// Errors that abort a pipeline run, by stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The location input was absent or blank.
    #[error("location input is missing or empty")]
    MissingLocation,

    /// Geocoding failed or found nothing.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    /// Zero scenes satisfy the query; checked before any export is
    /// submitted.
    #[error(
        "no scenes in {collection} match {start}..{end} with cloud cover below {max_cloud_pct}%"
    )]
    NoImagery {
        collection: String,
        start: String,
        end: String,
        max_cloud_pct: f64,
    },

    /// A platform request outside the export state machine failed.
    #[error("imagery platform error: {0}")]
    Platform(#[from] PlatformError),

    /// The export task failed, was cancelled, or timed out.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// The exported raster could not be located or downloaded.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Raster decoding or preview rendering failed.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// The manifest could not be persisted.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl PipelineError {
    /// True only for an absent location; the dispatch layer maps this to
    /// a 400. Every other failure, including a name that resolves to
    /// nothing, is a job failure and surfaces as a 500.
    pub fn is_input_error(&self) -> bool {
        matches!(self, PipelineError::MissingLocation)
    }
}

/// The assembled pipeline: configuration plus the three external
/// collaborators behind their traits, with injectable time sources for
/// tests.
pub struct ExportPipeline {
    config: PipelineConfig,
    geocoder: Arc<dyn Geocoder>,
    platform: Arc<dyn ImageryPlatform>,
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    delay: Arc<dyn Delay>,
    cancel: CancelToken,
    metrics: Arc<PipelineMetrics>,
}

impl ExportPipeline {
    /// Assemble a pipeline with the system clock and real sleeps.
    pub fn new(
        config: PipelineConfig,
        geocoder: Arc<dyn Geocoder>,
        platform: Arc<dyn ImageryPlatform>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            config,
            geocoder,
            platform,
            store,
            clock: Arc::new(SystemClock),
            delay: Arc::new(ThreadDelay),
            cancel: CancelToken::new(),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Substitute the clock used for export naming.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Substitute the delay source used between polls.
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Share a metrics registry across pipelines.
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// A clone of the cancellation token; cancel it to abort the poll
    /// loop.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The metrics registry recording this pipeline's events.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline for one location and persist the manifest
    /// to `manifest_path`. Returns the manifest on success.
    pub fn run(&self, location_query: &str, manifest_path: &Path) -> Result<Manifest, PipelineError> {
        let result = self.run_stages(location_query, manifest_path);
        match &result {
            Ok(_) => self.metrics.run_completed(),
            Err(_) => self.metrics.run_failed(),
        }
        result
    }

    fn run_stages(
        &self,
        location_query: &str,
        manifest_path: &Path,
    ) -> Result<Manifest, PipelineError> {
        let query = location_query.trim();
        if query.is_empty() {
            return Err(PipelineError::MissingLocation);
        }

        // 1. Resolve the place name.
        let location = self.geocoder.resolve(query)?;
        info!(location = %location.name, lat = location.lat, lon = location.lon, "location resolved");

        // 2. Build the imagery spec and check scene availability before
        // submitting anything.
        let roi = RegionOfInterest::around(&location, self.config.query.roi_radius_m);
        let scene_query = SceneQuery::from_config(&self.config.query, roi);
        let summary = self.platform.scene_summary(&scene_query)?;
        if summary.count == 0 {
            return Err(PipelineError::NoImagery {
                collection: scene_query.collection.clone(),
                start: scene_query.start_date.clone(),
                end: scene_query.end_date.clone(),
                max_cloud_pct: scene_query.max_cloud_pct,
            });
        }
        self.metrics.scenes_matched(summary.count);
        let capture_date = imagery::capture_date_utc(summary.earliest_ms);
        info!(scenes = summary.count, capture_date = %capture_date, "imagery available");

        // 3. Submit the export and poll it to a terminal state.
        let stack = ImageStack::sentinel2_default();
        let manager = ExportJobManager::new(
            Arc::clone(&self.platform),
            self.config.export.clone(),
            Arc::clone(&self.clock),
            Arc::clone(&self.delay),
            self.cancel.clone(),
        );
        let mut task = manager.submit(&stack, &roi)?;
        self.metrics.export_submitted();
        let poll_metrics = Arc::clone(&self.metrics);
        manager.wait_observed(&mut task, &move |_, _| poll_metrics.export_polled())?;

        // 4. Download the raster.
        let fetcher = ArtifactFetcher::new(self.store.as_ref(), &self.config.downloads_dir);
        let tif_name = format!("{}.tif", task.output_name);
        let fetched = fetcher.fetch(&tif_name, GEOTIFF_MEDIA_TYPE)?;
        self.metrics.bytes_downloaded(fetched.size_bytes);

        // 5. Decode and render the previews.
        let raster = RasterBands::open(&fetched.path)?;
        let converter = RasterConverter::new(&self.config.render);
        let artifacts = converter.convert(&raster, &task.output_name, &self.config.downloads_dir)?;
        for _ in &artifacts {
            self.metrics.artifact_rendered();
        }

        // 6. Persist the manifest.
        let manifest = Manifest {
            location: location.name.clone(),
            coords: Coords {
                lat: location.lat,
                lon: location.lon,
            },
            date: capture_date,
            tif: tif_name,
            png: PngSet {
                rgb: artifact_filename(&artifacts, ArtifactKind::Rgb),
                ndvi: artifact_filename(&artifacts, ArtifactKind::Ndvi),
                ndbi: artifact_filename(&artifacts, ArtifactKind::Ndbi),
            },
        };
        manifest.write(manifest_path)?;
        info!(path = %manifest_path.display(), "manifest written");

        Ok(manifest)
    }
}

fn artifact_filename(artifacts: &[VisualArtifact], kind: ArtifactKind) -> String {
    artifacts
        .iter()
        .find(|a| a.kind == kind)
        .map(|a| {
            a.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::tests::RecordingDelay;
    use crate::control::FixedClock;
    use crate::geocode::tests::MockGeocoder;
    use crate::geocode::Location;
    use crate::platform::tests::ScriptedPlatform;
    use crate::platform::{SceneSummary, TaskState};
    use crate::storage::tests::MockStore;
    use tempfile::TempDir;

    fn example_location() -> Location {
        Location {
            name: "Example City".to_string(),
            lat: 12.34,
            lon: 56.78,
        }
    }

    fn pipeline(
        dir: &TempDir,
        summary: SceneSummary,
        states: Vec<TaskState>,
        store: MockStore,
    ) -> (ExportPipeline, Arc<ScriptedPlatform>) {
        let platform = Arc::new(ScriptedPlatform::new(summary, states));
        let config = PipelineConfig::new(dir.path().join("downloads"));
        let pipeline = ExportPipeline::new(
            config,
            Arc::new(MockGeocoder {
                response: Ok(example_location()),
            }),
            platform.clone(),
            Arc::new(store),
        )
        .with_clock(Arc::new(FixedClock::at(1_700_000_000)))
        .with_delay(Arc::new(RecordingDelay::new()));
        (pipeline, platform)
    }

    #[test]
    fn test_blank_location_fails_before_geocoding() {
        let dir = TempDir::new().unwrap();
        let (pipeline, platform) = pipeline(
            &dir,
            SceneSummary {
                count: 1,
                earliest_ms: 0,
            },
            vec![],
            MockStore::with_single("x.tif", vec![]),
        );

        let err = pipeline
            .run("   ", &dir.path().join("manifest.json"))
            .unwrap_err();

        assert!(matches!(err, PipelineError::MissingLocation));
        assert!(err.is_input_error());
        assert_eq!(platform.submission_count(), 0);
    }

    #[test]
    fn test_zero_scenes_aborts_before_any_submission() {
        let dir = TempDir::new().unwrap();
        let (pipeline, platform) = pipeline(
            &dir,
            SceneSummary {
                count: 0,
                earliest_ms: 0,
            },
            vec![],
            MockStore::with_single("x.tif", vec![]),
        );

        let err = pipeline
            .run("Example City", &dir.path().join("manifest.json"))
            .unwrap_err();

        assert!(matches!(err, PipelineError::NoImagery { .. }));
        assert_eq!(
            platform.submission_count(),
            0,
            "no remote job may be created without imagery"
        );
        assert_eq!(pipeline.metrics().snapshot().runs_failed, 1);
    }

    #[test]
    fn test_failed_export_performs_no_download() {
        let dir = TempDir::new().unwrap();
        let store = MockStore::with_single("Site_Export_1700000000.tif", vec![1]);
        let (pipeline, platform) = pipeline(
            &dir,
            SceneSummary {
                count: 2,
                earliest_ms: 1_700_000_000_000,
            },
            vec![TaskState::Running, TaskState::Failed],
            store,
        );

        let err = pipeline
            .run("Example City", &dir.path().join("manifest.json"))
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Export(ExportError::Failed { .. })
        ));
        assert_eq!(platform.submission_count(), 1);
        assert!(
            !dir.path().join("downloads").exists(),
            "no download attempt after a failed export"
        );
    }

    #[test]
    fn test_geocode_not_found_is_a_job_failure_not_an_input_error() {
        let dir = TempDir::new().unwrap();
        let platform = Arc::new(ScriptedPlatform::new(
            SceneSummary {
                count: 1,
                earliest_ms: 0,
            },
            vec![],
        ));
        let pipeline = ExportPipeline::new(
            PipelineConfig::new(dir.path().join("downloads")),
            Arc::new(MockGeocoder {
                response: Err(GeocodeError::NotFound {
                    query: "Atlantis".to_string(),
                }),
            }),
            platform,
            Arc::new(MockStore::with_single("x.tif", vec![])),
        );

        let err = pipeline
            .run("Atlantis", &dir.path().join("manifest.json"))
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Geocode(GeocodeError::NotFound { .. })
        ));
        // Only an absent location is the caller's fault; an unresolvable
        // name fails the job like any other stage error.
        assert!(!err.is_input_error());
    }
}
