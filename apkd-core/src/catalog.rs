// apkd-core/src/catalog.rs
//! Metadata Repository: the catalog file is read whole and rewritten whole
//! through a temp-file rename, so readers never see a partial catalog.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use apkd_aio::{read_json_async, write_json_async};
use apkd_common::error::{ApkdError, CommitError, Result};
use apkd_common::{AppRecord, Catalog};
use tracing::{debug, info};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Current UTC time in the catalog's `lastUpdated` format.
pub fn timestamp_now() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone)]
pub struct MetadataRepository {
    path: PathBuf,
}

impl MetadataRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Catalog> {
        let shown = self.path.display().to_string();
        let catalog: Catalog = read_json_async(&self.path).await.map_err(|e| match e {
            ApkdError::Json(e) => ApkdError::CatalogMalformed(shown.clone(), e.to_string()),
            ApkdError::Io(e) if e.kind() == ErrorKind::NotFound => {
                ApkdError::CatalogUnreadable(shown.clone(), "file not found".to_string())
            }
            other => ApkdError::CatalogUnreadable(shown.clone(), other.to_string()),
        })?;
        debug!("Loaded {} catalog entries from {}", catalog.len(), shown);
        Ok(catalog)
    }

    /// Records a committed artifact replacement for the entry at `index`.
    /// The catalog is re-read first so edits made since the pass started
    /// are kept; if `index` no longer holds `title` the entry is looked up
    /// by title instead.
    pub async fn commit(
        &self,
        index: usize,
        title: &str,
        version: &str,
        timestamp: &str,
    ) -> Result<()> {
        let mut catalog = self.load().await?;
        let position = match catalog.get(index) {
            Some(app) if app.title == title => index,
            _ => catalog
                .apps
                .iter()
                .position(|app| app.title == title)
                .ok_or_else(|| CommitError::MissingEntry(index, title.to_string()))?,
        };

        let app = &mut catalog.apps[position];
        app.version = Some(version.to_string());
        app.last_updated = Some(timestamp.to_string());
        self.save(&catalog).await?;
        info!("Catalog entry '{}' now at version {}", title, version);
        Ok(())
    }

    /// Adds a new entry at the end of the catalog. A missing catalog file is
    /// treated as an empty catalog.
    pub async fn append(&self, record: AppRecord) -> Result<usize> {
        let mut catalog = match self.load().await {
            Ok(catalog) => catalog,
            Err(ApkdError::CatalogUnreadable(..)) if !self.path.exists() => Catalog::default(),
            Err(e) => return Err(e),
        };
        if catalog.apps.iter().any(|app| app.title == record.title) {
            return Err(ApkdError::ValidationError(format!(
                "an app titled '{}' already exists",
                record.title
            )));
        }
        let title = record.title.clone();
        catalog.apps.push(record);
        self.save(&catalog).await?;
        info!("Catalog entry '{}' added", title);
        Ok(catalog.len() - 1)
    }

    async fn save(&self, catalog: &Catalog) -> Result<()> {
        write_json_async(&self.path, catalog)
            .await
            .map_err(|e| CommitError::WriteDenied(e.to_string()).into())
    }
}
