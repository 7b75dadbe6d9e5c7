//! End-to-end pipeline test with scripted collaborators.
//!
//! "Example City" resolves to (12.34, 56.78); one scene matches the
//! filters; the export is driven PENDING -> RUNNING -> COMPLETED under a
//! fixed clock; the store serves a hand-built five-band GeoTIFF. The run
//! must produce the raster, three PNGs, and a manifest that survives a
//! round trip.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geosnap::config::PipelineConfig;
use geosnap::control::{CancelToken, Clock, Delay};
use geosnap::geocode::{GeocodeError, Geocoder, Location};
use geosnap::imagery::SceneQuery;
use geosnap::manifest::Manifest;
use geosnap::pipeline::ExportPipeline;
use geosnap::platform::{
    ExportRequest, ImageryPlatform, PlatformError, SceneSummary, TaskState, TaskStatus,
};
use geosnap::storage::{ArtifactStore, RemoteFile, StoreError};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

struct FixedGeocoder;

impl Geocoder for FixedGeocoder {
    fn resolve(&self, query: &str) -> Result<Location, GeocodeError> {
        assert_eq!(query, "Example City");
        Ok(Location {
            name: query.to_string(),
            lat: 12.34,
            lon: 56.78,
        })
    }
}

struct ScriptedPlatform {
    states: Mutex<Vec<TaskState>>,
    submissions: Mutex<Vec<ExportRequest>>,
}

impl ImageryPlatform for ScriptedPlatform {
    fn scene_summary(&self, query: &SceneQuery) -> Result<SceneSummary, PlatformError> {
        assert_eq!(query.roi.radius_m, 15_000.0);
        assert_eq!(query.max_cloud_pct, 10.0);
        Ok(SceneSummary {
            count: 1,
            // 2024-06-03T10:00:00Z
            earliest_ms: 1_717_408_800_000,
        })
    }

    fn submit_export(&self, request: &ExportRequest) -> Result<String, PlatformError> {
        self.submissions.lock().unwrap().push(request.clone());
        Ok("task-e2e".to_string())
    }

    fn task_status(&self, task_id: &str) -> Result<TaskStatus, PlatformError> {
        assert_eq!(task_id, "task-e2e");
        Ok(TaskStatus {
            state: self.states.lock().unwrap().remove(0),
            detail: None,
        })
    }
}

struct TiffStore {
    bytes: Vec<u8>,
}

impl ArtifactStore for TiffStore {
    fn find_exact(&self, name: &str, media_type: &str) -> Result<Vec<RemoteFile>, StoreError> {
        assert_eq!(media_type, "image/tiff");
        Ok(vec![RemoteFile {
            id: "drive-1".to_string(),
            name: name.to_string(),
            size_bytes: Some(self.bytes.len() as u64),
        }])
    }

    fn download(&self, _file: &RemoteFile, dest: &Path) -> Result<u64, StoreError> {
        fs::write(dest, &self.bytes).map_err(|e| StoreError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        Ok(self.bytes.len() as u64)
    }
}

struct TestClock;

impl Clock for TestClock {
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }
}

struct NoDelay;

impl Delay for NoDelay {
    fn sleep(&self, _duration: Duration) {}
}

fn push16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn entry(buf: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32) {
    push16(buf, tag);
    push16(buf, kind);
    push32(buf, count);
    push32(buf, value);
}

/// Minimal little-endian striped TIFF: five interleaved f32 bands.
fn five_band_tiff(width: u32, height: u32, bands: &[Vec<f32>; 5]) -> Vec<u8> {
    let pixels = (width * height) as usize;
    let mut strip: Vec<u8> = Vec::new();
    for p in 0..pixels {
        for band in bands {
            strip.extend_from_slice(&band[p].to_le_bytes());
        }
    }

    let strip_offset: u32 = 8;
    let bits_offset = strip_offset + strip.len() as u32;
    let format_offset = bits_offset + 10;
    let ifd_offset = format_offset + 10;

    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(b"II");
    push16(&mut buf, 42);
    push32(&mut buf, ifd_offset);
    buf.extend_from_slice(&strip);
    for _ in 0..5 {
        push16(&mut buf, 32); // bits per sample
    }
    for _ in 0..5 {
        push16(&mut buf, 3); // IEEE float
    }

    push16(&mut buf, 11);
    entry(&mut buf, 256, 4, 1, width);
    entry(&mut buf, 257, 4, 1, height);
    entry(&mut buf, 258, 3, 5, bits_offset);
    entry(&mut buf, 259, 3, 1, 1);
    entry(&mut buf, 262, 3, 1, 1);
    entry(&mut buf, 273, 4, 1, strip_offset);
    entry(&mut buf, 277, 3, 1, 5);
    entry(&mut buf, 278, 4, 1, height);
    entry(&mut buf, 279, 4, 1, strip.len() as u32);
    entry(&mut buf, 284, 3, 1, 1);
    entry(&mut buf, 339, 3, 5, format_offset);
    push32(&mut buf, 0);

    buf
}

fn scripted_pipeline(dir: &TempDir, states: Vec<TaskState>) -> ExportPipeline {
    let bands = [
        vec![600.0, 1500.0, 2400.0, 3600.0],
        vec![900.0; 4],
        vec![450.0; 4],
        vec![0.6, 0.2, -0.1, f32::NAN],
        vec![-0.3, 0.1, 0.4, f32::NAN],
    ];
    let config = PipelineConfig::new(dir.path().join("downloads"))
        .with_poll_interval(Duration::from_secs(10));

    ExportPipeline::new(
        config,
        Arc::new(FixedGeocoder),
        Arc::new(ScriptedPlatform {
            states: Mutex::new(states),
            submissions: Mutex::new(Vec::new()),
        }),
        Arc::new(TiffStore {
            bytes: five_band_tiff(2, 2, &bands),
        }),
    )
    .with_clock(Arc::new(TestClock))
    .with_delay(Arc::new(NoDelay))
}

#[test]
fn test_end_to_end_run_produces_manifest_and_artifacts() {
    let dir = TempDir::new().unwrap();
    let manifest_path = dir.path().join("manifest.json");
    let pipeline = scripted_pipeline(
        &dir,
        vec![TaskState::Pending, TaskState::Running, TaskState::Completed],
    );

    let manifest = pipeline.run("Example City", &manifest_path).unwrap();

    assert_eq!(manifest.location, "Example City");
    assert_eq!(manifest.coords.lat, 12.34);
    assert_eq!(manifest.coords.lon, 56.78);
    assert_eq!(manifest.date, "2024-06-03", "capture date from the scene");
    assert_eq!(manifest.tif, "Site_Export_1700000000.tif");
    assert_eq!(manifest.png.rgb, "Site_Export_1700000000_RGB.png");
    assert_eq!(manifest.png.ndvi, "Site_Export_1700000000_NDVI.png");
    assert_eq!(manifest.png.ndbi, "Site_Export_1700000000_NDBI.png");

    // Every referenced file exists in the downloads directory.
    let downloads = dir.path().join("downloads");
    for name in [
        &manifest.tif,
        &manifest.png.rgb,
        &manifest.png.ndvi,
        &manifest.png.ndbi,
    ] {
        assert!(downloads.join(name).exists(), "{} missing", name);
    }

    // The persisted manifest round-trips to identical field values.
    let restored = Manifest::read(&manifest_path).unwrap();
    assert_eq!(restored, manifest);

    let snapshot = pipeline.metrics().snapshot();
    assert_eq!(snapshot.scenes_matched, 1);
    assert_eq!(snapshot.exports_submitted, 1);
    assert_eq!(snapshot.export_polls, 3);
    assert_eq!(snapshot.artifacts_rendered, 3);
    assert_eq!(snapshot.runs_completed, 1);
}

#[test]
fn test_cancellation_aborts_the_poll_loop() {
    let dir = TempDir::new().unwrap();
    let cancel = CancelToken::new();
    let pipeline = scripted_pipeline(&dir, vec![TaskState::Pending])
        .with_cancel_token(cancel.clone());
    cancel.cancel();

    let err = pipeline
        .run("Example City", &dir.path().join("manifest.json"))
        .unwrap_err();

    assert!(err.to_string().contains("cancelled"), "got: {}", err);
    assert!(!dir.path().join("downloads").exists());
}

#[test]
fn test_rerunning_overwrites_with_identical_artifacts() {
    let dir = TempDir::new().unwrap();
    let manifest_path = dir.path().join("manifest.json");

    let first_manifest = scripted_pipeline(
        &dir,
        vec![TaskState::Completed],
    )
    .run("Example City", &manifest_path)
    .unwrap();
    let rgb = dir.path().join("downloads").join(&first_manifest.png.rgb);
    let first_bytes = fs::read(&rgb).unwrap();

    let second_manifest = scripted_pipeline(&dir, vec![TaskState::Completed])
        .run("Example City", &manifest_path)
        .unwrap();

    assert_eq!(first_manifest, second_manifest);
    assert_eq!(
        fs::read(&rgb).unwrap(),
        first_bytes,
        "fixed stretch and ramps are reproducible"
    );
}
