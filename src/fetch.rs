//! Resource access shared by the source adapters: a locator over remote URLs
//! and local files, plus the provenance tag carried by retrieved datasets.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Where a dataset in memory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// Fetched from the upstream source during this run.
    Live,
    /// Read from the bundled fallback copy after the upstream source failed.
    Fallback,
}

impl DataOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A data source: either a URL fetched over HTTP or a file on disk. Local
/// files make every download path testable without a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Url(String),
    File(PathBuf),
}

impl Locator {
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::File(PathBuf::from(value))
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug)]
pub enum FetchError {
    Http { url: String, source: reqwest::Error },
    Status { url: String, status: reqwest::StatusCode },
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { url, source } => write!(f, "request to {url} failed: {source}"),
            Self::Status { url, status } => {
                write!(f, "request to {url} returned status {status}")
            }
            Self::Io { path, source } => {
                write!(f, "unable to read '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http { source, .. } => Some(source),
            Self::Status { .. } => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

pub(crate) fn http_client() -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
}

/// Retrieves the full body behind a locator as text.
pub fn fetch_text(locator: &Locator) -> Result<String, FetchError> {
    match locator {
        Locator::Url(url) => {
            let client = http_client().map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;
            let response = client.get(url).send().map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;
            if !response.status().is_success() {
                return Err(FetchError::Status {
                    url: url.clone(),
                    status: response.status(),
                });
            }
            response.text().map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })
        }
        Locator::File(path) => read_local(path),
    }
}

pub(crate) fn read_local(path: &Path) -> Result<String, FetchError> {
    fs::read_to_string(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })
}
