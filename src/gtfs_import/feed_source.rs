//! Getting a dataset onto local disk as a plain directory.
//!
//! Downloads and extracted archives live in `tempfile` handles, so they are
//! removed when the handle is dropped, whether reading succeeded or not.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::info;

use super::errors::{FeedReadError, io_err};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Remote(String),
    Local(PathBuf),
}

impl FeedSource {
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            FeedSource::Remote(trimmed.to_string())
        } else {
            FeedSource::Local(PathBuf::from(trimmed))
        }
    }
}

/// A directory holding the feed's text files.
#[derive(Debug)]
pub struct UnpackedFeed {
    root: PathBuf,
    _workdir: Option<TempDir>,
}

impl UnpackedFeed {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub async fn download_to_tempfile(
    client: &reqwest::Client,
    url: &str,
) -> Result<NamedTempFile, FeedReadError> {
    let download_err = |source| FeedReadError::Download {
        url: url.to_string(),
        source,
    };

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(download_err)?;

    let bytes = response.bytes().await.map_err(download_err)?;

    let mut file = NamedTempFile::new().map_err(|e| io_err!(std::env::temp_dir(), e))?;
    file.write_all(&bytes)
        .map_err(|e| io_err!(file.path(), e))?;

    info!("Downloaded {} bytes from {}", bytes.len(), url);

    Ok(file)
}

/// Directories are used in place, anything else is treated as a zip archive
/// and extracted. A single top-level folder inside the archive is stripped.
pub fn unpack(path: &Path) -> Result<UnpackedFeed, FeedReadError> {
    if path.is_dir() {
        return Ok(UnpackedFeed {
            root: path.to_path_buf(),
            _workdir: None,
        });
    }

    if !path.is_file() {
        return Err(FeedReadError::NotFound(path.display().to_string()));
    }

    let bytes = std::fs::read(path).map_err(|e| io_err!(path, e))?;

    let workdir = tempfile::tempdir().map_err(|e| io_err!(path, e))?;

    zip_extract::extract(Cursor::new(bytes), workdir.path(), true).map_err(|e| {
        FeedReadError::Archive {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    Ok(UnpackedFeed {
        root: workdir.path().to_path_buf(),
        _workdir: Some(workdir),
    })
}
