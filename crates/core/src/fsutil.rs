//! Small filesystem helpers with error context.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Write `contents` to `path` so readers observe either the old file or the
/// complete new one, never a partial write.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    // Write to a temporary file first, then rename atomically
    let temp_path = sibling_temp(path);
    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| Error::io(e, Some(temp_path.clone()), "create"))?;

    file.write_all(contents)
        .await
        .map_err(|e| Error::io(e, Some(temp_path.clone()), "write_all"))?;
    file.sync_all()
        .await
        .map_err(|e| Error::io(e, Some(temp_path.clone()), "sync_all"))?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(Error::io(e, Some(path.to_path_buf()), "rename"));
    }
    Ok(())
}

/// Create `dir` and its parents if missing.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::io(e, Some(dir.to_path_buf()), "create_dir_all"))
}

/// Remove a directory tree, treating a missing directory as success.
pub async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(e, Some(dir.to_path_buf()), "remove_dir_all")),
    }
}

/// Remove a file, treating a missing file as success.
pub async fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(e, Some(path.to_path_buf()), "remove_file")),
    }
}

fn sibling_temp(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}
