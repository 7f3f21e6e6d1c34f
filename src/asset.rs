//! Asset Acquisition - Idempotent, Cached Fetching
//!
//! An asset is acquired into a target directory under its filename.
//! The presence of that file is the only cache signal; nothing is
//! re-fetched or checksummed once it exists.

use serde::Serialize;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("I/O error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to acquire \"{locator}\" as \"{filename}\": {cause}")]
    Acquisition {
        locator: String,
        filename: String,
        #[source]
        cause: FetchError,
    },

    #[error("Invalid asset filename \"{0}\": must be a relative path without \"..\"")]
    InvalidFilename(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Capability to materialize a source locator at a local path.
pub trait Fetcher {
    fn fetch(&self, source: &str, destination: &Path) -> Result<(), FetchError>;
}

/// Copies local paths and `file://` URLs, downloads `http(s)://` URLs.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    timeout: Duration,
    system_proxy: bool,
}

impl SourceFetcher {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            system_proxy: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ignore `HTTP_PROXY` and friends.
    pub fn without_proxy(mut self) -> Self {
        self.system_proxy = false;
        self
    }

    fn copy(&self, path: &Path, destination: &Path) -> Result<(), FetchError> {
        fs::copy(path, destination)
            .map(|_| ())
            .map_err(|e| FetchError::NotFound(format!("{}: {}", path.display(), e)))
    }

    fn download(&self, url: reqwest::Url, destination: &Path) -> Result<(), FetchError> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(format!("tedi/{}", crate::VERSION))
            .timeout(self.timeout);
        if !self.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let mut response = client
            .get(url.clone())
            .send()
            .map_err(|e| FetchError::NetworkError(format!("{url}: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(format!("{url}: HTTP {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::ProtocolError(format!("{url}: HTTP {status}")));
        }

        let mut file = File::create(destination).map_err(|source| FetchError::Io {
            path: destination.to_path_buf(),
            source,
        })?;
        response
            .copy_to(&mut file)
            .map_err(|e| FetchError::NetworkError(format!("{url}: {e}")))?;
        Ok(())
    }
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

enum Locator {
    Path(PathBuf),
    Remote(reqwest::Url),
}

fn is_url(source: &str) -> bool {
    source.contains("://")
}

fn locate(source: &str) -> Result<Locator, FetchError> {
    if !is_url(source) {
        return Ok(Locator::Path(PathBuf::from(source)));
    }

    let url = reqwest::Url::parse(source)
        .map_err(|e| FetchError::ProtocolError(format!("malformed URL \"{source}\": {e}")))?;
    match url.scheme() {
        "file" => url
            .to_file_path()
            .map(Locator::Path)
            .map_err(|_| FetchError::ProtocolError(format!("not a local file URL: {source}"))),
        "http" | "https" => Ok(Locator::Remote(url)),
        scheme => Err(FetchError::ProtocolError(format!(
            "unsupported scheme \"{scheme}\" in {source}"
        ))),
    }
}

impl Fetcher for SourceFetcher {
    fn fetch(&self, source: &str, destination: &Path) -> Result<(), FetchError> {
        match locate(source)? {
            Locator::Path(path) => self.copy(&path, destination),
            Locator::Remote(url) => self.download(url, destination),
        }
    }
}

/// A single file to acquire. Fields are already expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub filename: String,
    pub source: String,
}

/// Outcome of [`Asset::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    Cached(PathBuf),
    Fetched(PathBuf),
}

impl Acquired {
    pub fn path(&self) -> &Path {
        match self {
            Acquired::Cached(path) | Acquired::Fetched(path) => path,
        }
    }

    pub fn was_cached(&self) -> bool {
        matches!(self, Acquired::Cached(_))
    }
}

impl Asset {
    pub fn new(filename: impl Into<String>, source: impl Into<String>) -> Self {
        let asset = Self {
            filename: filename.into(),
            source: source.into(),
        };
        debug!(filename = %asset.filename, source = %asset.source, "New asset");
        asset
    }

    /// The same asset with a relative local source joined onto
    /// `base_dir`. URLs and absolute paths are returned unchanged.
    pub fn relative_to(&self, base_dir: &Path) -> Asset {
        let path = Path::new(&self.source);
        if is_url(&self.source) || path.is_absolute() {
            return self.clone();
        }
        Asset {
            filename: self.filename.clone(),
            source: base_dir.join(path).to_string_lossy().into_owned(),
        }
    }

    fn check_filename(&self) -> Result<(), AssetError> {
        let path = Path::new(&self.filename);
        let plain = !self.filename.is_empty()
            && path.components().all(|c| matches!(c, Component::Normal(_)));
        if plain {
            Ok(())
        } else {
            Err(AssetError::InvalidFilename(self.filename.clone()))
        }
    }

    /// Fetch this asset into `target_dir` unless a file of the same name
    /// is already there.
    ///
    /// Content is staged in a temporary file beside the target and renamed
    /// into place, so a failed fetch never leaves a file that would later
    /// count as cached.
    pub fn acquire(&self, target_dir: &Path, fetcher: &dyn Fetcher) -> Result<Acquired, AssetError> {
        self.check_filename()?;

        let target = target_dir.join(&self.filename);
        let parent = target.parent().unwrap_or(target_dir);
        fs::create_dir_all(parent).map_err(|source| AssetError::Io {
            path: parent.to_path_buf(),
            source,
        })?;

        if target.exists() {
            debug!(path = %target.display(), source = %self.source, "Using cached asset");
            return Ok(Acquired::Cached(target));
        }

        info!(source = %self.source, path = %target.display(), "Acquiring asset");
        let staging = tempfile::Builder::new()
            .prefix(".tedi-")
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(|source| AssetError::Io {
                path: parent.to_path_buf(),
                source,
            })?
            .into_temp_path();

        if let Err(cause) = fetcher.fetch(&self.source, &staging) {
            error!(source = %self.source, error = %cause, "Error acquiring asset");
            return Err(AssetError::Acquisition {
                locator: self.source.clone(),
                filename: self.filename.clone(),
                cause,
            });
        }

        staging.persist(&target).map_err(|e| AssetError::Io {
            path: target.clone(),
            source: e.error,
        })?;
        Ok(Acquired::Fetched(target))
    }
}
