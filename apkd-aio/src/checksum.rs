// apkd-aio/src/checksum.rs
use std::path::Path;
use std::sync::Arc;

use apkd_common::error::{ApkdError, Result};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Asynchronously computes the hex SHA-256 digest of a file.
/// Reads the file asynchronously but performs hashing synchronously.
pub async fn sha256_file_async(path: &Path) -> Result<String> {
    debug!("Async hashing: {}", path.display());
    let mut file = File::open(path)
        .await
        .map_err(|e| ApkdError::Io(Arc::new(e)))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    let mut total_bytes_read: u64 = 0;

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| ApkdError::Io(Arc::new(e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total_bytes_read += n as u64;
    }

    let actual = hex::encode(hasher.finalize());
    debug!(
        "Async Calculated SHA256: {} ({} bytes read)",
        actual, total_bytes_read
    );
    Ok(actual)
}
