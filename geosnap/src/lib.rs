//! GeoSnap - satellite composite exports for named places
//!
//! This library turns a human-readable place name into a set of geospatial
//! raster products: a five-band satellite composite (visible color plus NDVI
//! and NDBI), rendered preview images, and a manifest describing what was
//! produced.
//!
//! # Pipeline
//!
//! ```text
//! geocode ──► imagery ──► export ──► storage ──► raster/render ──► manifest
//! (place)     (ROI +      (remote    (GeoTIFF     (RGB + index      (JSON
//!             scenes)     task)      download)    PNGs)             record)
//! ```
//!
//! The pipeline is strictly sequential: each stage blocks until its
//! predecessor's output is available, and the first error aborts the run.
//! External collaborators (geocoding, the imagery platform, artifact
//! storage) sit behind traits so tests can substitute them.

pub mod config;
pub mod control;
pub mod export;
pub mod geocode;
pub mod imagery;
pub mod log;
pub mod manifest;
pub mod pipeline;
pub mod platform;
pub mod raster;
pub mod render;
pub mod storage;
pub mod telemetry;

pub use config::PipelineConfig;
pub use manifest::Manifest;
pub use pipeline::{ExportPipeline, PipelineError};

/// Library version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_not_empty() {
        assert!(!VERSION.is_empty(), "Version should not be empty");
    }
}
