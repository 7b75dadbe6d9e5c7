//! Command implementations and shared endpoint wiring.

pub mod run;
pub mod serve;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use geosnap::config::{ConfigFile, PipelineConfig};
use geosnap::geocode::NominatimGeocoder;
use geosnap::pipeline::ExportPipeline;
use geosnap::platform::{RestPlatformClient, StaticToken, TokenProvider};
use geosnap::storage::RestArtifactStore;

use crate::error::CliError;

/// Flags shared by `run` and `serve`: config file, endpoints,
/// credentials, and the downloads directory. Flags override the config
/// file, which overrides built-in defaults.
#[derive(Debug, Args)]
pub struct EndpointArgs {
    /// Path to an INI config file.
    #[arg(long, env = "GEOSNAP_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Imagery platform base URL.
    #[arg(long, env = "GEOSNAP_PLATFORM_URL", value_name = "URL")]
    pub platform_url: Option<String>,

    /// Artifact storage base URL.
    #[arg(long, env = "GEOSNAP_STORAGE_URL", value_name = "URL")]
    pub storage_url: Option<String>,

    /// Bearer token for the platform and storage APIs.
    #[arg(long, env = "GEOSNAP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// File containing the bearer token.
    #[arg(long, env = "GEOSNAP_TOKEN_FILE", value_name = "FILE")]
    pub token_file: Option<PathBuf>,

    /// Local directory receiving rasters and previews.
    #[arg(long, value_name = "DIR")]
    pub downloads_dir: Option<PathBuf>,
}

/// Fully resolved settings after layering defaults, config file, and
/// flags.
pub struct ResolvedSettings {
    pub pipeline: PipelineConfig,
    pub platform_url: String,
    pub storage_url: String,
    pub token: String,
    pub server_port: u16,
}

impl EndpointArgs {
    pub fn resolve(&self) -> Result<ResolvedSettings, CliError> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };

        let mut pipeline = file.pipeline_config();
        if let Some(dir) = &self.downloads_dir {
            pipeline.downloads_dir = dir.clone();
        }

        let platform_url = self
            .platform_url
            .clone()
            .or_else(|| file.platform_base_url().map(str::to_string))
            .ok_or_else(|| {
                CliError::Config(
                    "no imagery platform endpoint; set --platform-url or [platform] base_url"
                        .to_string(),
                )
            })?;
        let storage_url = self
            .storage_url
            .clone()
            .or_else(|| file.storage_base_url().map(str::to_string))
            .ok_or_else(|| {
                CliError::Config(
                    "no artifact storage endpoint; set --storage-url or [storage] base_url"
                        .to_string(),
                )
            })?;

        let token = resolve_token(self.token.as_deref(), self.token_file.as_deref())?;

        Ok(ResolvedSettings {
            pipeline,
            platform_url,
            storage_url,
            token,
            server_port: file.server_port(),
        })
    }
}

fn resolve_token(
    token: Option<&str>,
    token_file: Option<&std::path::Path>,
) -> Result<String, CliError> {
    if let Some(token) = token {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }
    if let Some(path) = token_file {
        let raw = fs::read_to_string(path).map_err(|e| CliError::TokenFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    Err(CliError::Config(
        "no credentials; set --token or --token-file".to_string(),
    ))
}

/// Assemble a pipeline with live clients from resolved settings.
pub fn build_pipeline(settings: &ResolvedSettings) -> Result<ExportPipeline, CliError> {
    let token: Arc<dyn TokenProvider> = Arc::new(StaticToken::new(settings.token.clone()));

    let geocoder = NominatimGeocoder::new().map_err(|e| CliError::Setup(e.to_string()))?;
    let platform = RestPlatformClient::new(&settings.platform_url, Arc::clone(&token))
        .map_err(|e| CliError::Setup(e.to_string()))?;
    let store = RestArtifactStore::new(&settings.storage_url, token)
        .map_err(|e| CliError::Setup(e.to_string()))?;

    Ok(ExportPipeline::new(
        settings.pipeline.clone(),
        Arc::new(geocoder),
        Arc::new(platform),
        Arc::new(store),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_token_flag_wins_over_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "from-file").unwrap();

        let token = resolve_token(Some("from-flag"), Some(file.path())).unwrap();
        assert_eq!(token, "from-flag");
    }

    #[test]
    fn test_token_file_is_trimmed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  secret-token\n").unwrap();

        let token = resolve_token(None, Some(file.path())).unwrap();
        assert_eq!(token, "secret-token");
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let err = resolve_token(None, None).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_missing_token_file_errors() {
        let err = resolve_token(None, Some(std::path::Path::new("/nonexistent/token"))).unwrap_err();
        assert!(matches!(err, CliError::TokenFile { .. }));
    }
}
