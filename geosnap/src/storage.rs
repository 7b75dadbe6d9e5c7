//! Artifact storage - locating and downloading the exported raster.
//!
//! After the export completes, the raster sits in remote storage under
//! the export's output name. [`ArtifactFetcher`] looks it up through the
//! [`ArtifactStore`] trait and streams it into the local downloads
//! directory.
//!
//! Lookups require exactly one match: zero matches means the export never
//! landed, and more than one means another run collided on the name, in
//! which case guessing could download the wrong file. Both are distinct
//! errors raised before any download. Local writes have no overwrite
//! protection; a name collision in the downloads directory silently
//! replaces the earlier file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::platform::{PlatformError, TokenProvider};

/// Media type of the exported raster.
pub const GEOTIFF_MEDIA_TYPE: &str = "image/tiff";

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const DOWNLOAD_BUFFER_SIZE: usize = 64 * 1024;

/// A file entry in remote storage.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

/// Errors raised while locating or downloading an artifact.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No file with the exact name and media type exists.
    #[error("no file named '{name}' found in remote storage")]
    NotFound { name: String },

    /// Several files share the exact name; refusing to guess.
    #[error("{count} files named '{name}' found in remote storage")]
    AmbiguousName { name: String, count: usize },

    /// The HTTP request failed or returned a non-success status.
    #[error("storage request failed: {0}")]
    Http(String),

    /// Authentication failed.
    #[error(transparent)]
    Auth(PlatformError),

    /// A local filesystem operation failed.
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Remote file storage: listing and content download.
pub trait ArtifactStore: Send + Sync {
    /// List files matching the exact name and media type.
    fn find_exact(&self, name: &str, media_type: &str) -> Result<Vec<RemoteFile>, StoreError>;

    /// Download a file's content to a local path. Returns bytes written.
    fn download(&self, file: &RemoteFile, dest: &Path) -> Result<u64, StoreError>;
}

/// A downloaded artifact on local disk.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Fetches a named artifact into the downloads directory.
pub struct ArtifactFetcher<'a> {
    store: &'a dyn ArtifactStore,
    downloads_dir: &'a Path,
}

impl<'a> ArtifactFetcher<'a> {
    pub fn new(store: &'a dyn ArtifactStore, downloads_dir: &'a Path) -> Self {
        Self {
            store,
            downloads_dir,
        }
    }

    /// Locate the single file with this exact name and stream it to
    /// `<downloads_dir>/<name>`, creating the directory if absent.
    pub fn fetch(&self, name: &str, media_type: &str) -> Result<FetchedArtifact, StoreError> {
        let matches = self.store.find_exact(name, media_type)?;
        let file = match matches.len() {
            0 => {
                return Err(StoreError::NotFound {
                    name: name.to_string(),
                })
            }
            1 => &matches[0],
            count => {
                return Err(StoreError::AmbiguousName {
                    name: name.to_string(),
                    count,
                })
            }
        };

        fs::create_dir_all(self.downloads_dir).map_err(|e| StoreError::Io {
            path: self.downloads_dir.to_path_buf(),
            source: e,
        })?;

        let dest = self.downloads_dir.join(&file.name);
        let size_bytes = self.store.download(file, &dest)?;

        info!(name = %file.name, size_bytes, path = %dest.display(), "artifact downloaded");

        Ok(FetchedArtifact {
            path: dest,
            size_bytes,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    files: Vec<RemoteFile>,
}

/// REST client for the storage contract.
pub struct RestArtifactStore {
    client: reqwest::blocking::Client,
    base_url: String,
    token: Arc<dyn TokenProvider>,
}

impl RestArtifactStore {
    pub fn new(base_url: &str, token: Arc<dyn TokenProvider>) -> Result<Self, StoreError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn token(&self) -> Result<String, StoreError> {
        self.token.bearer_token().map_err(StoreError::Auth)
    }
}

impl ArtifactStore for RestArtifactStore {
    fn find_exact(&self, name: &str, media_type: &str) -> Result<Vec<RemoteFile>, StoreError> {
        let url = format!("{}/files", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .query(&[("name", name), ("media_type", media_type)])
            .send()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .json::<ListResponse>()
            .map(|r| r.files)
            .map_err(|e| StoreError::Http(format!("bad listing response: {}", e)))
    }

    fn download(&self, file: &RemoteFile, dest: &Path) -> Result<u64, StoreError> {
        let url = format!("{}/files/{}/content", self.base_url, file.id);
        let mut response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let out = File::create(dest).map_err(|e| StoreError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(out);
        let mut buffer = vec![0u8; DOWNLOAD_BUFFER_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = response
                .read(&mut buffer)
                .map_err(|e| StoreError::Http(format!("read error: {}", e)))?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n]).map_err(|e| StoreError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
            written += n as u64;
        }

        writer.flush().map_err(|e| StoreError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;

        Ok(written)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory store: name -> (file entries, content).
    pub struct MockStore {
        pub files: Vec<RemoteFile>,
        pub content: Vec<u8>,
        pub downloads: Mutex<u32>,
    }

    impl MockStore {
        pub fn with_single(name: &str, content: Vec<u8>) -> Self {
            Self {
                files: vec![RemoteFile {
                    id: "file-1".to_string(),
                    name: name.to_string(),
                    size_bytes: Some(content.len() as u64),
                }],
                content,
                downloads: Mutex::new(0),
            }
        }
    }

    impl ArtifactStore for MockStore {
        fn find_exact(&self, name: &str, _media_type: &str) -> Result<Vec<RemoteFile>, StoreError> {
            Ok(self
                .files
                .iter()
                .filter(|f| f.name == name)
                .cloned()
                .collect())
        }

        fn download(&self, _file: &RemoteFile, dest: &Path) -> Result<u64, StoreError> {
            *self.downloads.lock().unwrap() += 1;
            fs::write(dest, &self.content).map_err(|e| StoreError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
            Ok(self.content.len() as u64)
        }
    }

    #[test]
    fn test_fetch_streams_single_match_and_creates_dir() {
        let dir = TempDir::new().unwrap();
        let downloads = dir.path().join("downloads");
        let store = MockStore::with_single("Site_Export_1700000000.tif", vec![1, 2, 3]);

        let fetched = ArtifactFetcher::new(&store, &downloads)
            .fetch("Site_Export_1700000000.tif", GEOTIFF_MEDIA_TYPE)
            .unwrap();

        assert_eq!(fetched.size_bytes, 3);
        assert_eq!(
            fetched.path,
            downloads.join("Site_Export_1700000000.tif")
        );
        assert_eq!(fs::read(&fetched.path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_matches_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = MockStore::with_single("other.tif", vec![]);

        let err = ArtifactFetcher::new(&store, dir.path())
            .fetch("missing.tif", GEOTIFF_MEDIA_TYPE)
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound { ref name } if name == "missing.tif"));
        assert_eq!(*store.downloads.lock().unwrap(), 0);
    }

    #[test]
    fn test_ambiguous_name_refuses_to_download() {
        let dir = TempDir::new().unwrap();
        let mut store = MockStore::with_single("dup.tif", vec![9]);
        store.files.push(RemoteFile {
            id: "file-2".to_string(),
            name: "dup.tif".to_string(),
            size_bytes: None,
        });

        let err = ArtifactFetcher::new(&store, dir.path())
            .fetch("dup.tif", GEOTIFF_MEDIA_TYPE)
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::AmbiguousName { count: 2, .. }
        ));
        assert_eq!(
            *store.downloads.lock().unwrap(),
            0,
            "no download attempt on ambiguity"
        );
    }

    #[test]
    fn test_fetch_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("x.tif");
        fs::write(&dest, b"old").unwrap();
        let store = MockStore::with_single("x.tif", b"new!".to_vec());

        let fetched = ArtifactFetcher::new(&store, dir.path())
            .fetch("x.tif", GEOTIFF_MEDIA_TYPE)
            .unwrap();

        assert_eq!(fs::read(fetched.path).unwrap(), b"new!");
    }
}
