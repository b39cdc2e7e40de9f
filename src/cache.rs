//! Installer image cache.
//!
//! One path, downloaded at most once. A non-empty file at the cache path is
//! trusted as-is: no checksum, no resume. A failed download can therefore
//! leave a truncated entry behind; the operator clears the cache directory to
//! recover.

use std::path::Path;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::errors::{ForgeError, ForgeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Non-empty file already present; no network access performed.
    Hit,
    Downloaded,
}

/// Ensure the installer image exists at `dest`, downloading it if needed.
pub async fn ensure_image(url: &str, dest: &Path) -> ForgeResult<CacheStatus> {
    if let Ok(meta) = tokio::fs::metadata(dest).await
        && meta.is_file()
        && meta.len() > 0
    {
        tracing::info!(path = %dest.display(), size = meta.len(), "installer image cached, skipping download");
        return Ok(CacheStatus::Hit);
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tracing::info!(url, path = %dest.display(), "downloading installer image");
    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ForgeError::Download(e.to_string()))?;

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ForgeError::Download(e.to_string()))?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    tracing::info!(path = %dest.display(), "installer image downloaded");
    Ok(CacheStatus::Downloaded)
}
