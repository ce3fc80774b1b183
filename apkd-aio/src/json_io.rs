// apkd-aio/src/json_io.rs
use std::path::Path;
use std::sync::Arc;

use apkd_common::error::{ApkdError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Asynchronously writes serializable data to a JSON file (pretty-printed,
/// two-space indent) through an atomic replace.
pub async fn write_json_async<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Async Writing JSON to: {}", path.display());
    // Serialize synchronously (CPU-bound, usually fast)
    let mut json_bytes = serde_json::to_vec_pretty(data).map_err(|e| ApkdError::Json(Arc::new(e)))?;
    json_bytes.push(b'\n');
    crate::fs::atomic_write_file_async(path, json_bytes).await
}

/// Asynchronously reads and deserializes data from a JSON file.
pub async fn read_json_async<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Async Reading JSON from: {}", path.display());
    let json_bytes = crate::fs::read_to_bytes_async(path).await?;
    serde_json::from_slice(&json_bytes).map_err(|e| ApkdError::Json(Arc::new(e)))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[tokio::test]
    async fn writes_pretty_json_and_reads_it_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("apps.json");
        let value = json!({"apps": [{"title": "Кино", "ver": "1.0"}]});

        write_json_async(&path, &value).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"apps\""));
        assert!(raw.contains("Кино"));
        let back: Value = read_json_async(&path).await.unwrap();
        assert_eq!(back, value);
    }

    #[tokio::test]
    async fn malformed_json_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apps.json");
        std::fs::write(&path, b"{\"apps\": [").unwrap();

        let err = read_json_async::<Value>(&path).await.unwrap_err();
        assert!(matches!(err, ApkdError::Json(_)));
    }
}
