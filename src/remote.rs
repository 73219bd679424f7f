use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tempfile::NamedTempFile;

use crate::error::IngestError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(Utf8PathBuf),
    S3(String),
    Http(String),
}

impl Location {
    pub fn is_remote(&self) -> bool {
        !matches!(self, Location::Local(_))
    }

    /// Relative local paths are anchored at `base`; URLs are returned as-is.
    pub fn rooted_at(self, base: &Utf8Path) -> Self {
        match self {
            Location::Local(path) if path.is_relative() => Location::Local(base.join(path)),
            other => other,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{path}"),
            Location::S3(url) | Location::Http(url) => write!(f, "{url}"),
        }
    }
}

impl FromStr for Location {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IngestError::InvalidSource(value.to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("s3://") {
            if rest.split_once('/').is_none_or(|(bucket, key)| bucket.is_empty() || key.is_empty()) {
                return Err(IngestError::InvalidSource(value.to_string()));
            }
            return Ok(Location::S3(trimmed.to_string()));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(Location::Http(trimmed.to_string()));
        }
        if trimmed.contains("://") {
            return Err(IngestError::InvalidSource(value.to_string()));
        }
        Ok(Location::Local(Utf8PathBuf::from(trimmed)))
    }
}

pub trait SnapshotFetcher {
    fn fetch(&self, location: &Location, destination: &Path) -> Result<(), IngestError>;
}

pub struct RemoteFetcher {
    client: Client,
    aws: Option<PathBuf>,
}

impl RemoteFetcher {
    pub fn new() -> Result<Self, IngestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ncov-ingest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| IngestError::DownloadHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| IngestError::DownloadHttp(err.to_string()))?;
        Ok(Self {
            client,
            aws: find_in_path("aws"),
        })
    }

    fn s3_copy(&self, url: &str, destination: &Path) -> Result<(), IngestError> {
        let aws = self
            .aws
            .as_ref()
            .ok_or_else(|| IngestError::MissingTool("aws".to_string()))?;
        let output = Command::new(aws)
            .args(["s3", "cp", "--no-progress", url])
            .arg(destination)
            .output()
            .map_err(|err| IngestError::ToolFailed(err.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("aws s3 cp {url} exited with {}", output.status)
        } else {
            stderr
        };
        Err(IngestError::ToolFailed(message))
    }

    fn http_download(&self, url: &str, destination: &Path) -> Result<(), IngestError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| IngestError::DownloadHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "download failed".to_string());
            return Err(IngestError::DownloadStatus { status, message });
        }
        let mut file = File::create(destination)
            .map_err(|err| IngestError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| IngestError::DownloadHttp(err.to_string()))?;
        Ok(())
    }
}

impl SnapshotFetcher for RemoteFetcher {
    fn fetch(&self, location: &Location, destination: &Path) -> Result<(), IngestError> {
        tracing::info!("downloading {location}");
        match location {
            Location::Local(path) => std::fs::copy(path.as_std_path(), destination)
                .map(|_| ())
                .map_err(|err| IngestError::Filesystem(format!("copy {path}: {err}"))),
            Location::S3(url) => self.s3_copy(url, destination),
            Location::Http(url) => self.http_download(url, destination),
        }
    }
}

/// A readable local file. Downloads live in a temp file that is deleted when
/// this value is dropped, whether the command succeeded or not.
#[derive(Debug)]
pub struct Materialized {
    path: PathBuf,
    _temp: Option<NamedTempFile>,
}

impl Materialized {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn materialize<F: SnapshotFetcher + ?Sized>(
    fetcher: &F,
    location: &Location,
) -> Result<Materialized, IngestError> {
    if let Location::Local(path) = location {
        return Ok(Materialized {
            path: path.clone().into_std_path_buf(),
            _temp: None,
        });
    }
    let temp = tempfile::Builder::new()
        .prefix("ncov-ingest-")
        .tempfile()
        .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    fetcher.fetch(location, temp.path())?;
    Ok(Materialized {
        path: temp.path().to_path_buf(),
        _temp: Some(temp),
    })
}

pub(crate) fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
