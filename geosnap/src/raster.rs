//! Multi-band GeoTIFF decoding.
//!
//! The downloaded raster is a five-band 32-bit float GeoTIFF in fixed
//! band order: Red, Green, Blue, NDVI, NDBI, with samples interleaved
//! per pixel (chunky layout). Anything else is rejected with a
//! [`ConvertError`] naming the offending property. Geo-referencing tags
//! are ignored; only the pixel grid matters for rendering.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::debug;

/// Fixed number of bands in the exported raster.
pub const BAND_COUNT: usize = 5;

/// Band names in storage order.
pub const BAND_NAMES: [&str; BAND_COUNT] = ["Red", "Green", "Blue", "NDVI", "NDBI"];

/// Errors raised during raster decoding or preview encoding.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The raster file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TIFF structure could not be decoded.
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// The file does not carry the expected number of bands.
    #[error("{path} has {found} bands, expected {expected}")]
    BandCount {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    /// Samples are not 32-bit IEEE floats.
    #[error("{path} has an unsupported sample format, expected 32-bit IEEE float")]
    SampleFormat { path: PathBuf },

    /// Bands are stored in separate planes instead of interleaved.
    #[error("{path} uses planar band layout, expected chunky (interleaved)")]
    PlanarLayout { path: PathBuf },

    /// A preview image could not be encoded.
    #[error("failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

/// A single decoded band: a `width x height` grid of f32 samples in
/// row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct BandPlane {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<f32>,
}

impl BandPlane {
    /// Sample at (column, row). Panics out of bounds, like slice indexing.
    pub fn get(&self, col: u32, row: u32) -> f32 {
        self.samples[(row as usize) * (self.width as usize) + (col as usize)]
    }
}

/// The decoded raster: path plus the five planes in fixed band order.
#[derive(Debug)]
pub struct RasterBands {
    pub path: PathBuf,
    planes: Vec<BandPlane>,
}

impl RasterBands {
    /// Decode a five-band f32 GeoTIFF from disk.
    pub fn open(path: &Path) -> Result<Self, ConvertError> {
        let file = File::open(path).map_err(|e| ConvertError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| ConvertError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let (width, height) = decoder.dimensions().map_err(|e| ConvertError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // PlanarConfiguration defaults to 1 (chunky) when absent.
        let planar = decoder
            .find_tag(Tag::PlanarConfiguration)
            .ok()
            .flatten()
            .and_then(|v| v.into_u16().ok())
            .unwrap_or(1);
        if planar != 1 {
            return Err(ConvertError::PlanarLayout {
                path: path.to_path_buf(),
            });
        }

        let image = decoder.read_image().map_err(|e| ConvertError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let samples = match image {
            DecodingResult::F32(samples) => samples,
            _ => {
                return Err(ConvertError::SampleFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        let pixels = (width as usize) * (height as usize);
        if pixels == 0 {
            return Err(ConvertError::Decode {
                path: path.to_path_buf(),
                reason: "empty image".to_string(),
            });
        }
        if samples.len() % pixels != 0 {
            return Err(ConvertError::Decode {
                path: path.to_path_buf(),
                reason: format!(
                    "{} samples is not a whole number of {}-pixel bands",
                    samples.len(),
                    pixels
                ),
            });
        }
        let found = samples.len() / pixels;
        if found != BAND_COUNT {
            return Err(ConvertError::BandCount {
                path: path.to_path_buf(),
                found,
                expected: BAND_COUNT,
            });
        }

        // Deinterleave chunky samples into per-band planes.
        let mut planes = vec![
            BandPlane {
                width,
                height,
                samples: vec![0.0; pixels],
            };
            BAND_COUNT
        ];
        for (pixel, chunk) in samples.chunks_exact(BAND_COUNT).enumerate() {
            for (band, &value) in chunk.iter().enumerate() {
                planes[band].samples[pixel] = value;
            }
        }

        debug!(path = %path.display(), width, height, bands = BAND_COUNT, "raster decoded");

        Ok(Self {
            path: path.to_path_buf(),
            planes,
        })
    }

    pub fn width(&self) -> u32 {
        self.planes[0].width
    }

    pub fn height(&self) -> u32 {
        self.planes[0].height
    }

    pub fn red(&self) -> &BandPlane {
        &self.planes[0]
    }

    pub fn green(&self) -> &BandPlane {
        &self.planes[1]
    }

    pub fn blue(&self) -> &BandPlane {
        &self.planes[2]
    }

    pub fn ndvi(&self) -> &BandPlane {
        &self.planes[3]
    }

    pub fn ndbi(&self) -> &BandPlane {
        &self.planes[4]
    }
}
