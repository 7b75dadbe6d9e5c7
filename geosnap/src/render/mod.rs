//! Raster-to-visual conversion.
//!
//! Turns the downloaded five-band raster into three preview images under
//! a fixed, reproducible rendering policy:
//!
//! - **RGB**: the first three bands through a fixed linear stretch
//!   (`clip(v / divisor, 0, 1) * 255`), encoded as PNG. Not adaptive, so
//!   the same sensor renders the same way across runs.
//! - **NDVI / NDBI**: each index through its fixed display range and
//!   color ramp, annotated with a colorbar, title, and axis labels.
//!
//! Products are written independently in order RGB, NDVI, NDBI; the
//! first failure aborts the conversion stage.

mod chart;
mod colormap;
mod font;

pub use colormap::{ColorRamp, BLUE_RED_DIVERGING, RED_YELLOW_GREEN};

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::info;

use crate::config::RenderConfig;
use crate::raster::{ConvertError, RasterBands};

/// Kind of rendered preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Rgb,
    Ndvi,
    Ndbi,
}

impl ArtifactKind {
    /// Filename suffix, as in `Site_Export_1700000000_RGB.png`.
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Rgb => "RGB",
            ArtifactKind::Ndvi => "NDVI",
            ArtifactKind::Ndbi => "NDBI",
        }
    }
}

/// A rendered preview on disk. Immutable once written.
#[derive(Debug, Clone)]
pub struct VisualArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// Renders preview images from a decoded raster.
pub struct RasterConverter<'a> {
    config: &'a RenderConfig,
}

impl<'a> RasterConverter<'a> {
    pub fn new(config: &'a RenderConfig) -> Self {
        Self { config }
    }

    /// Render all three products into `out_dir` as
    /// `{base_name}_{RGB,NDVI,NDBI}.png`.
    pub fn convert(
        &self,
        raster: &RasterBands,
        base_name: &str,
        out_dir: &Path,
    ) -> Result<Vec<VisualArtifact>, ConvertError> {
        let mut artifacts = Vec::with_capacity(3);

        let rgb_path = out_dir.join(format!("{}_RGB.png", base_name));
        save_png(&self.rgb_image(raster).into(), &rgb_path)?;
        artifacts.push(VisualArtifact {
            kind: ArtifactKind::Rgb,
            path: rgb_path,
        });

        let ndvi_path = out_dir.join(format!("{}_NDVI.png", base_name));
        let (lo, hi) = self.config.ndvi_range;
        let ndvi = chart::render_index_chart(raster.ndvi(), &RED_YELLOW_GREEN, lo, hi, "NDVI");
        save_png(&ndvi.into(), &ndvi_path)?;
        artifacts.push(VisualArtifact {
            kind: ArtifactKind::Ndvi,
            path: ndvi_path,
        });

        let ndbi_path = out_dir.join(format!("{}_NDBI.png", base_name));
        let (lo, hi) = self.config.ndbi_range;
        let ndbi = chart::render_index_chart(raster.ndbi(), &BLUE_RED_DIVERGING, lo, hi, "NDBI");
        save_png(&ndbi.into(), &ndbi_path)?;
        artifacts.push(VisualArtifact {
            kind: ArtifactKind::Ndbi,
            path: ndbi_path,
        });

        info!(source = %raster.path.display(), base_name, dir = %out_dir.display(), "previews rendered");
        Ok(artifacts)
    }

    /// Compose the true-color image from the first three bands.
    fn rgb_image(&self, raster: &RasterBands) -> RgbImage {
        let divisor = self.config.reflectance_divisor;
        let (red, green, blue) = (raster.red(), raster.green(), raster.blue());
        RgbImage::from_fn(raster.width(), raster.height(), |x, y| {
            image::Rgb([
                stretch(red.get(x, y), divisor),
                stretch(green.get(x, y), divisor),
                stretch(blue.get(x, y), divisor),
            ])
        })
    }
}

/// The fixed linear reflectance stretch: `clip(v / divisor, 0, 1) * 255`,
/// rounded to 8 bits. Non-finite samples (masked pixels) map to 0.
pub fn stretch(value: f32, divisor: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    ((value as f64 / divisor).clamp(0.0, 1.0) * 255.0).round() as u8
}

fn save_png(img: &image::DynamicImage, path: &Path) -> Result<(), ConvertError> {
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|e| ConvertError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
