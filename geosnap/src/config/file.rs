//! INI configuration file support.
//!
//! The CLI layers settings in the usual order: defaults, then the config
//! file, then command-line flags. This module owns the middle layer. All
//! values are optional; anything absent falls back to the defaults in
//! [`super::PipelineConfig`].
//!
//! ```ini
//! [pipeline]
//! roi_radius_m = 15000
//! start_date = 2024-06-01
//! end_date = 2024-06-30
//! max_cloud_pct = 10
//! scale_m = 30
//! poll_interval_secs = 10
//! poll_timeout_secs = 1800
//!
//! [platform]
//! base_url = https://imagery.example.com/v1
//! collection = COPERNICUS/S2_SR
//!
//! [storage]
//! base_url = https://files.example.com/v1
//! downloads_dir = /var/lib/geosnap/downloads
//!
//! [server]
//! port = 8001
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use ini::Ini;
use thiserror::Error;

use super::PipelineConfig;

/// Default dispatch-server port.
pub const DEFAULT_SERVER_PORT: u16 = 8001;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or parsed as INI.
    #[error("failed to load config file {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// A present key holds a value of the wrong shape.
    #[error("invalid value for [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        reason: String,
    },
}

/// Parsed configuration file.
///
/// Holds a fully-resolved [`PipelineConfig`] (defaults overridden by the
/// file) plus the endpoint settings the CLI needs to construct clients.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pipeline: PipelineConfig,
    platform_base_url: Option<String>,
    storage_base_url: Option<String>,
    server_port: u16,
}

impl ConfigFile {
    /// Load and validate a config file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Build from an already-parsed INI document.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut pipeline = PipelineConfig::default();

        if let Some(section) = ini.section(Some("pipeline")) {
            if let Some(v) = section.get("roi_radius_m") {
                pipeline.query.roi_radius_m = parse_f64("pipeline", "roi_radius_m", v)?;
            }
            if let Some(v) = section.get("start_date") {
                pipeline.query.start_date = parse_date("pipeline", "start_date", v)?;
            }
            if let Some(v) = section.get("end_date") {
                pipeline.query.end_date = parse_date("pipeline", "end_date", v)?;
            }
            if let Some(v) = section.get("max_cloud_pct") {
                pipeline.query.max_cloud_pct = parse_f64("pipeline", "max_cloud_pct", v)?;
            }
            if let Some(v) = section.get("scale_m") {
                pipeline.export.scale_m = parse_u32("pipeline", "scale_m", v)?;
            }
            if let Some(v) = section.get("poll_interval_secs") {
                let secs = parse_u64("pipeline", "poll_interval_secs", v)?;
                pipeline.export.poll_interval = Duration::from_secs(secs);
            }
            if let Some(v) = section.get("poll_timeout_secs") {
                let secs = parse_u64("pipeline", "poll_timeout_secs", v)?;
                pipeline.export.poll_timeout = Some(Duration::from_secs(secs));
            }
        }

        if let Some(section) = ini.section(Some("platform")) {
            if let Some(v) = section.get("collection") {
                pipeline.query.collection = v.to_string();
            }
        }

        if let Some(section) = ini.section(Some("storage")) {
            if let Some(v) = section.get("downloads_dir") {
                pipeline.downloads_dir = PathBuf::from(v);
            }
        }

        let platform_base_url = ini
            .section(Some("platform"))
            .and_then(|s| s.get("base_url"))
            .map(str::to_string);
        let storage_base_url = ini
            .section(Some("storage"))
            .and_then(|s| s.get("base_url"))
            .map(str::to_string);

        let server_port = match ini.section(Some("server")).and_then(|s| s.get("port")) {
            Some(v) => parse_u16("server", "port", v)?,
            None => DEFAULT_SERVER_PORT,
        };

        Ok(Self {
            pipeline,
            platform_base_url,
            storage_base_url,
            server_port,
        })
    }

    /// The pipeline config with file overrides applied.
    pub fn pipeline_config(&self) -> PipelineConfig {
        self.pipeline.clone()
    }

    /// Imagery platform endpoint, if configured.
    pub fn platform_base_url(&self) -> Option<&str> {
        self.platform_base_url.as_deref()
    }

    /// Artifact storage endpoint, if configured.
    pub fn storage_base_url(&self) -> Option<&str> {
        self.storage_base_url.as_deref()
    }

    /// Dispatch-server port.
    pub fn server_port(&self) -> u16 {
        self.server_port
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            platform_base_url: None,
            storage_base_url: None,
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

fn parse_f64(section: &'static str, key: &'static str, v: &str) -> Result<f64, ConfigError> {
    v.trim()
        .parse::<f64>()
        .map_err(|e| ConfigError::InvalidValue {
            section,
            key,
            reason: e.to_string(),
        })
}

fn parse_u32(section: &'static str, key: &'static str, v: &str) -> Result<u32, ConfigError> {
    v.trim()
        .parse::<u32>()
        .map_err(|e| ConfigError::InvalidValue {
            section,
            key,
            reason: e.to_string(),
        })
}

fn parse_u64(section: &'static str, key: &'static str, v: &str) -> Result<u64, ConfigError> {
    v.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            section,
            key,
            reason: e.to_string(),
        })
}

fn parse_u16(section: &'static str, key: &'static str, v: &str) -> Result<u16, ConfigError> {
    v.trim()
        .parse::<u16>()
        .map_err(|e| ConfigError::InvalidValue {
            section,
            key,
            reason: e.to_string(),
        })
}

fn parse_date(section: &'static str, key: &'static str, v: &str) -> Result<String, ConfigError> {
    let v = v.trim();
    NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|e| ConfigError::InvalidValue {
        section,
        key,
        reason: format!("expected YYYY-MM-DD: {}", e),
    })?;
    Ok(v.to_string())
}
