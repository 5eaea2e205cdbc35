//! Source acquisition: fetch the document a job points at.
//!
//! The universal converter reads from a file path, so [`materialize`] writes
//! the download into a `TempDir` under a suffix matching the source type. The
//! directory is removed when the [`MaterializedSource`] is dropped.

use crate::error::ConvertError;
use crate::transport::HttpTransport;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// A downloaded source held in a job-scoped temp directory.
///
/// The directory (and the file in it) is removed on drop.
#[derive(Debug)]
pub struct MaterializedSource {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl MaterializedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Download `url` fully into memory.
pub async fn download_bytes(
    transport: &dyn HttpTransport,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, ConvertError> {
    debug!("Downloading source from: {}", url);

    let response = transport.get(url, timeout).await.map_err(|e| {
        let reason = if e.timed_out {
            format!("timed out after {}s", timeout.as_secs())
        } else {
            e.message
        };
        ConvertError::Download {
            url: url.to_string(),
            reason,
        }
    })?;

    if !response.is_success() {
        return Err(ConvertError::Download {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status),
        });
    }

    debug!("Downloaded {} bytes", response.body.len());
    Ok(response.body)
}

/// Download `url` into a fresh temp directory as `source<suffix>`.
pub async fn materialize(
    transport: &dyn HttpTransport,
    url: &str,
    suffix: &str,
    timeout: Duration,
) -> Result<MaterializedSource, ConvertError> {
    let bytes = download_bytes(transport, url, timeout).await?;

    let temp_dir = TempDir::new().map_err(|e| ConvertError::Internal(format!("tempdir: {e}")))?;
    let path = temp_dir.path().join(format!("source{suffix}"));

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| ConvertError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Materialized {} bytes at {}", bytes.len(), path.display());

    Ok(MaterializedSource {
        path,
        _temp_dir: temp_dir,
    })
}
