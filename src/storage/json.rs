//! JSON file helpers with write-temp-then-rename replacement.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::error::{Result, ScrapeError};

/// Read and parse a JSON file. `Ok(None)` when the file does not exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ScrapeError::io(path, err)),
    };
    let value = serde_json::from_slice(&bytes).map_err(|source| ScrapeError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(value))
}

/// Replace `path` with the pretty-printed JSON of `value`.
///
/// Readers observe either the previous file or the complete new one; a failed
/// write leaves the previous file untouched.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .await
        .map_err(|e| ScrapeError::io(parent, e))?;

    let data = serde_json::to_vec_pretty(value).map_err(|source| ScrapeError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;

    // Same directory as the target so the rename stays on one filesystem
    let tmp_path = tempfile::Builder::new()
        .prefix(".tubescrape-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| ScrapeError::io(parent, e))?
        .into_temp_path();

    fs::write(&tmp_path, &data)
        .await
        .map_err(|e| ScrapeError::io(&*tmp_path, e))?;
    tmp_path
        .persist(path)
        .map_err(|e| ScrapeError::io(path, e.error))?;
    Ok(())
}
