//! Imagery specification - region of interest, scene filtering, band math.
//!
//! This module defines *what* the remote platform is asked to composite:
//! a circular region around the resolved location, a hard scene filter
//! (date window plus cloud ceiling), and the five-band stack the export
//! carries (visible color plus two normalized-difference indices).
//! Mosaic compositing itself is platform-defined: where scenes overlap,
//! the most recent valid pixel wins.

use chrono::DateTime;
use serde::Serialize;

use crate::config::SceneQueryConfig;
use crate::geocode::Location;

/// Circular region of interest used as the spatial filter and export
/// clip. Never mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionOfInterest {
    pub center_lat: f64,
    pub center_lon: f64,
    /// Buffer radius in meters. Fixed per run, independent of location.
    pub radius_m: f64,
}

impl RegionOfInterest {
    /// Build the region around a resolved location.
    pub fn around(location: &Location, radius_m: f64) -> Self {
        Self {
            center_lat: location.lat,
            center_lon: location.lon,
            radius_m,
        }
    }
}

/// Defines which source scenes qualify for the mosaic.
///
/// The date range is a fixed calendar window and the cloud threshold is a
/// hard filter: scenes at or above the ceiling are excluded, not
/// down-ranked.
#[derive(Debug, Clone, Serialize)]
pub struct SceneQuery {
    pub collection: String,
    pub roi: RegionOfInterest,
    pub start_date: String,
    pub end_date: String,
    pub max_cloud_pct: f64,
}

impl SceneQuery {
    /// Combine the configured filter constants with a concrete region.
    pub fn from_config(config: &SceneQueryConfig, roi: RegionOfInterest) -> Self {
        Self {
            collection: config.collection.clone(),
            roi,
            start_date: config.start_date.clone(),
            end_date: config.end_date.clone(),
            max_cloud_pct: config.max_cloud_pct,
        }
    }
}

/// Sentinel-2 source bands used by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceBand {
    /// Blue (490 nm).
    B2,
    /// Green (560 nm).
    B3,
    /// Red (665 nm).
    B4,
    /// Near infrared (842 nm).
    B8,
    /// Short-wave infrared (1610 nm).
    B11,
}

impl SourceBand {
    /// Platform band code.
    pub fn code(&self) -> &'static str {
        match self {
            SourceBand::B2 => "B2",
            SourceBand::B3 => "B3",
            SourceBand::B4 => "B4",
            SourceBand::B8 => "B8",
            SourceBand::B11 => "B11",
        }
    }
}

/// A normalized-difference band computed pixel-wise on the platform:
/// `(plus - minus) / (plus + minus)`, bounded to [-1, 1] by construction.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedBand {
    pub name: String,
    pub plus: SourceBand,
    pub minus: SourceBand,
}

impl DerivedBand {
    /// NDVI: vegetation index, `(NIR - Red) / (NIR + Red)`.
    pub fn ndvi() -> Self {
        Self {
            name: "NDVI".to_string(),
            plus: SourceBand::B8,
            minus: SourceBand::B4,
        }
    }

    /// NDBI: built-up index, `(SWIR - NIR) / (SWIR + NIR)`.
    pub fn ndbi() -> Self {
        Self {
            name: "NDBI".to_string(),
            plus: SourceBand::B11,
            minus: SourceBand::B8,
        }
    }
}

/// The composite the export carries: three visible bands in Red, Green,
/// Blue order, the derived indices, and a validity mask taken from one
/// reference band's coverage. Pixels where the reference band is invalid
/// are masked out of every band.
#[derive(Debug, Clone, Serialize)]
pub struct ImageStack {
    pub visible: [SourceBand; 3],
    pub derived: Vec<DerivedBand>,
    pub mask_band: SourceBand,
}

impl ImageStack {
    /// The fixed Sentinel-2 recipe: RGB from B4/B3/B2, NDVI and NDBI,
    /// masked by B8 coverage.
    pub fn sentinel2_default() -> Self {
        Self {
            visible: [SourceBand::B4, SourceBand::B3, SourceBand::B2],
            derived: vec![DerivedBand::ndvi(), DerivedBand::ndbi()],
            mask_band: SourceBand::B8,
        }
    }
}

/// Normalized difference of two reflectance samples.
///
/// Returns NaN when the denominator is zero (both bands empty), which the
/// rendering stage treats as nodata.
pub fn normalized_difference(plus: f32, minus: f32) -> f32 {
    let sum = plus + minus;
    if sum == 0.0 {
        f32::NAN
    } else {
        (plus - minus) / sum
    }
}

/// Derive the capture date (UTC calendar date) from the earliest
/// acquisition time among the mosaic's inputs, in Unix milliseconds.
pub fn capture_date_utc(earliest_ms: i64) -> String {
    DateTime::from_timestamp_millis(earliest_ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}
