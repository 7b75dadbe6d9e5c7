//! The manifest record - the durable contract handed to downstream
//! consumers.
//!
//! Written exactly once per successful run to a caller-specified path.
//! The JSON shape is fixed; the dispatch layer reads it back verbatim
//! and only augments it with browser-resolvable URLs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coordinates of the resolved location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

/// Filenames of the three rendered previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PngSet {
    pub rgb: String,
    pub ndvi: String,
    pub ndbi: String,
}

/// A run's descriptor record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// The location query the run was invoked with.
    pub location: String,
    pub coords: Coords,
    /// Capture date of the mosaic, `YYYY-MM-DD` (UTC).
    pub date: String,
    /// Filename of the downloaded raster.
    pub tif: String,
    pub png: PngSet,
}

/// Errors raised while persisting or reading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Manifest {
    /// Persist as pretty-printed JSON. Last write wins if the path is
    /// shared between runs.
    pub fn write(&self, path: &Path) -> Result<(), ManifestError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Read a previously written manifest.
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let bytes = fs::read(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn example() -> Manifest {
        Manifest {
            location: "Example City".to_string(),
            coords: Coords {
                lat: 12.34,
                lon: 56.78,
            },
            date: "2024-06-03".to_string(),
            tif: "Site_Export_1700000000.tif".to_string(),
            png: PngSet {
                rgb: "Site_Export_1700000000_RGB.png".to_string(),
                ndvi: "Site_Export_1700000000_NDVI.png".to_string(),
                ndbi: "Site_Export_1700000000_NDBI.png".to_string(),
            },
        }
    }

    #[test]
    fn test_round_trip_preserves_all_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = example();

        manifest.write(&path).unwrap();
        let restored = Manifest::read(&path).unwrap();

        assert_eq!(restored, manifest);
    }

    #[test]
    fn test_json_shape_matches_the_contract() {
        let value = serde_json::to_value(example()).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["coords", "date", "location", "png", "tif"]);
        assert_eq!(value["coords"]["lat"], 12.34);
        assert_eq!(value["coords"]["lon"], 56.78);
        assert_eq!(value["date"], "2024-06-03");

        let png = value["png"].as_object().unwrap();
        assert_eq!(png.len(), 3, "exactly rgb, ndvi, ndbi");
        assert!(value["png"]["rgb"]
            .as_str()
            .unwrap()
            .ends_with("_RGB.png"));
    }

    #[test]
    fn test_unknown_date_format_still_round_trips() {
        // The writer controls the format; the reader does not validate it.
        let mut manifest = example();
        manifest.date = "2024-06-03".to_string();
        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.date, "2024-06-03");
    }

    #[test]
    fn test_write_to_missing_directory_errors() {
        let err = example()
            .write(Path::new("/nonexistent/dir/manifest.json"))
            .unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
