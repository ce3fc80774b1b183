/*
File: apkd-aio/src/fs.rs
Purpose: Filesystem primitives. Every write that replaces a file readers may
be looking at goes through a temp file in the destination directory followed
by a rename.
*/
use std::{
    fs::{self, File, Permissions},
    io::{self, Write},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::Arc,
};

use apkd_common::error::{ApkdError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

/// Mode for files served to the public.
pub const WORLD_READABLE: u32 = 0o644;

/// Creates a directory and all its parent components if they are missing.
pub fn create_dir_all(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        ApkdError::from(e)
    })
}

fn parent_dir(path: &Path) -> Result<&Path> {
    path.parent().ok_or_else(|| {
        ApkdError::IoError(format!(
            "Cannot get parent directory for {}",
            path.display()
        ))
    })
}

fn persist(temp_file: NamedTempFile, temp_path: &Path, target: &Path) -> Result<()> {
    temp_file.persist(target).map_err(|e| {
        error!(
            "Failed to persist/rename temporary file {} over {}: {}",
            temp_path.display(),
            target.display(),
            e.error
        );
        ApkdError::Io(Arc::new(e.error))
    })?;
    Ok(())
}

/// Atomically writes data to a file using a temporary file.
/// Preserves original permissions if possible.
pub fn atomic_write_file(original_path: &Path, content: &[u8]) -> Result<()> {
    let dir = parent_dir(original_path)?;
    create_dir_all(dir)?;

    let original_perms = fs::metadata(original_path).map(|m| m.permissions()).ok();

    let mut temp_file = NamedTempFile::new_in(dir)?;
    let temp_path = temp_file.path().to_path_buf();

    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_path.display()
    );

    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    // Set the final mode on the temp file so the renamed file never shows
    // the 0600 tempfile default.
    let mode = original_perms
        .map(|p| p.mode())
        .unwrap_or(WORLD_READABLE);
    if let Err(e) = fs::set_permissions(&temp_path, Permissions::from_mode(mode)) {
        warn!(
            "Failed to set permissions {:o} on {}: {}",
            mode,
            temp_path.display(),
            e
        );
    }

    persist(temp_file, &temp_path, original_path)
}

/// Copies `source` into `target`'s directory under a temporary name, syncs
/// it, applies `mode`, then renames it over `target`. Readers of `target`
/// see either the old content or the new one, never a partial file. The
/// copy keeps the final rename on one filesystem even when `source` lives
/// elsewhere.
pub fn install_file_atomically(source: &Path, target: &Path, mode: u32) -> Result<u64> {
    let dir = parent_dir(target)?;
    create_dir_all(dir)?;

    let mut reader = File::open(source).map_err(|e| {
        error!("Failed open file {}: {}", source.display(), e);
        ApkdError::from(e)
    })?;
    let mut temp_file = NamedTempFile::new_in(dir)?;
    let temp_path = temp_file.path().to_path_buf();
    debug!(
        "Installing {} to {} via temp file {}",
        source.display(),
        target.display(),
        temp_path.display()
    );

    let bytes = io::copy(&mut reader, temp_file.as_file_mut())?;
    temp_file.as_file().sync_all()?;
    fs::set_permissions(&temp_path, Permissions::from_mode(mode))?;

    persist(temp_file, &temp_path, target)?;
    debug!("Installed {} bytes at {}", bytes, target.display());
    Ok(bytes)
}

/// Async wrapper around [`install_file_atomically`]; the copy runs on the
/// blocking pool.
pub async fn install_file_atomically_async(
    source: PathBuf,
    target: PathBuf,
    mode: u32,
) -> Result<u64> {
    tokio::task::spawn_blocking(move || install_file_atomically(&source, &target, mode))
        .await
        .map_err(|e| ApkdError::Generic(format!("install task failed: {e}")))?
}

/// Async wrapper around [`atomic_write_file`].
pub async fn atomic_write_file_async(path: &Path, content: Vec<u8>) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || atomic_write_file(&path, &content))
        .await
        .map_err(|e| ApkdError::Generic(format!("atomic write task failed: {e}")))?
}

/// Reads the entire contents of a file into a byte vector.
pub async fn read_to_bytes_async(path: &Path) -> Result<Vec<u8>> {
    debug!("Reading file to bytes: {}", path.display());
    tokio::fs::read(path).await.map_err(|e| {
        if e.kind() != io::ErrorKind::NotFound {
            error!("Failed read file {}: {}", path.display(), e);
        }
        ApkdError::from(e)
    })
}
