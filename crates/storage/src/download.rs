//! Download boundary: fetching input files into a workdir.
//!
//! The engine is agnostic to the transport; [`DownloadService`] is the
//! boundary trait, with a `file://` implementation for locally reachable
//! sources, an HTTP implementation on `reqwest`, and a composite that
//! dispatches on the URL scheme.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use pyxis_core::file::InputFile;
use pyxis_core::hashing;

use crate::error::StorageError;

// ---------------------------------------------------------------------------
// Scheme detection
// ---------------------------------------------------------------------------

/// Transport scheme of an input file's source URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceScheme {
    File,
    Http,
}

/// Detect the transport scheme from a source URL.
pub fn detect_source_scheme(url: &str) -> Result<SourceScheme, StorageError> {
    let trimmed = url.trim();
    if trimmed.starts_with("file://") {
        Ok(SourceScheme::File)
    } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(SourceScheme::Http)
    } else {
        Err(StorageError::UnsupportedUrl { url: url.into() })
    }
}

// ---------------------------------------------------------------------------
// DownloadService
// ---------------------------------------------------------------------------

/// Externally supplied file-fetch capability.
#[async_trait]
pub trait DownloadService: Send + Sync {
    /// Fetch `file` into `dest`, returning the local path on success.
    async fn download(&self, file: &InputFile, dest: &Path) -> Result<PathBuf, StorageError>;
}

/// Fetch `file` to `dest` through `service`, then verify the declared
/// checksum when the descriptor carries one.
///
/// A mismatch is logged, not fatal: catalog checksums are advisory and some
/// upstream systems populate them with placeholders.
pub async fn fetch_input(
    service: &dyn DownloadService,
    file: &InputFile,
    dest: &Path,
) -> Result<PathBuf, StorageError> {
    let path = service.download(file, dest).await?;
    if let Some(expected) = file.checksum.as_deref().filter(|c| !c.trim().is_empty()) {
        let bytes = tokio::fs::read(&path).await?;
        if !hashing::matches_sha256_hex(&bytes, expected) {
            tracing::warn!(
                file = %file.name,
                expected,
                actual = %hashing::sha256_hex(&bytes),
                "Downloaded input does not match its declared checksum",
            );
        }
    }
    Ok(path)
}

// ---------------------------------------------------------------------------
// LocalFileDownloader
// ---------------------------------------------------------------------------

/// Downloader for `file://` sources, copying from the local filesystem.
#[derive(Debug, Default)]
pub struct LocalFileDownloader;

#[async_trait]
impl DownloadService for LocalFileDownloader {
    async fn download(&self, file: &InputFile, dest: &Path) -> Result<PathBuf, StorageError> {
        let source = file
            .source_url
            .trim()
            .strip_prefix("file://")
            .ok_or_else(|| StorageError::UnsupportedUrl {
                url: file.source_url.clone(),
            })?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, dest)
            .await
            .map_err(|e| StorageError::Download {
                file: file.name.clone(),
                url: file.source_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(dest.to_path_buf())
    }
}

// ---------------------------------------------------------------------------
// HttpDownloader
// ---------------------------------------------------------------------------

/// Downloader for `http(s)://` sources, streaming the body to disk.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DownloadService for HttpDownloader {
    async fn download(&self, file: &InputFile, dest: &Path) -> Result<PathBuf, StorageError> {
        let download_err = |reason: String| StorageError::Download {
            file: file.name.clone(),
            url: file.source_url.clone(),
            reason,
        };

        let response = self
            .client
            .get(file.source_url.trim())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_err(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut out = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_err(e.to_string()))?;
            out.write_all(&chunk).await?;
        }
        out.flush().await?;
        Ok(dest.to_path_buf())
    }
}

// ---------------------------------------------------------------------------
// AutoDownloader
// ---------------------------------------------------------------------------

/// Composite downloader dispatching on the source URL scheme.
#[derive(Debug, Default)]
pub struct AutoDownloader {
    local: LocalFileDownloader,
    http: HttpDownloader,
}

impl AutoDownloader {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DownloadService for AutoDownloader {
    async fn download(&self, file: &InputFile, dest: &Path) -> Result<PathBuf, StorageError> {
        match detect_source_scheme(&file.source_url)? {
            SourceScheme::File => self.local.download(file, dest).await,
            SourceScheme::Http => self.http.download(file, dest).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
