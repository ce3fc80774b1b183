// apkd-core/src/store.rs
//! Artifact Store: staging, hashing, version extraction and promotion of
//! APK files. Only [`ArtifactStore::promote`] writes into the artifact
//! directory.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use apkd_aio::{install_file_atomically_async, run_command_async, sha256_file_async, WORLD_READABLE};
use apkd_common::error::{ApkdError, FetchError, PromoteError, Result};
use apkd_common::model::validate_filename;
use apkd_common::version::UNKNOWN_VERSION;
use apkd_common::Config;
use apkd_net::download_to_file;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tempfile::TempDir;
use tracing::{debug, error, warn};

static VERSION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"versionName='([^']*)'").expect("versionName pattern is valid"));

/// Scratch directory shared by all staged artifacts of one pass. Removed,
/// with everything in it, when dropped.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    next: AtomicUsize,
}

impl StagingArea {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn next_path(&self) -> PathBuf {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        self.dir.path().join(format!("candidate-{n}.apk"))
    }
}

/// A fetched or uploaded file awaiting a commit decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub path: PathBuf,
    pub size: u64,
}

impl StagedArtifact {
    /// Wraps a file that already sits in caller-owned scratch space.
    pub async fn from_local(path: PathBuf) -> Result<Self> {
        let size = tokio::fs::metadata(&path).await?.len();
        if size == 0 {
            return Err(ApkdError::ValidationError(format!(
                "{} is empty",
                path.display()
            )));
        }
        Ok(Self { path, size })
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    client: Client,
    apks_dir: PathBuf,
    tmp_root: PathBuf,
    version_tool: PathBuf,
    command_timeout: Duration,
}

impl ArtifactStore {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            apks_dir: config.apks_dir.clone(),
            tmp_root: config.tmp_dir(),
            version_tool: config.version_tool.clone(),
            command_timeout: config.command_timeout,
        }
    }

    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        self.apks_dir.join(filename)
    }

    pub fn open_staging(&self) -> Result<StagingArea> {
        std::fs::create_dir_all(&self.tmp_root)?;
        let dir = tempfile::Builder::new()
            .prefix("pass-")
            .tempdir_in(&self.tmp_root)?;
        debug!("Opened staging area {}", dir.path().display());
        Ok(StagingArea {
            dir,
            next: AtomicUsize::new(0),
        })
    }

    pub async fn fetch(&self, staging: &StagingArea, url: &str) -> Result<StagedArtifact> {
        let path = staging.next_path();
        let size = download_to_file(&self.client, url, &path).await?;
        if size == 0 {
            return Err(FetchError::Empty(url.to_string()).into());
        }
        debug!("Staged {} bytes from {} at {}", size, url, path.display());
        Ok(StagedArtifact { path, size })
    }

    pub async fn hash(&self, staged: &StagedArtifact) -> Result<String> {
        sha256_file_async(&staged.path).await
    }

    /// Digest of the artifact currently served under `filename`, or `None`
    /// when nothing is there yet.
    pub async fn current_hash(&self, filename: &str) -> Result<Option<String>> {
        let path = self.artifact_path(filename);
        if !path.is_file() {
            return Ok(None);
        }
        sha256_file_async(&path).await.map(Some)
    }

    /// Fails when the inspection tool cannot be found at all. Checked once
    /// per pass; individual extraction failures are not errors.
    pub fn ensure_tool_present(&self) -> Result<()> {
        which::which(&self.version_tool)
            .map(|found| debug!("Version tool found at {}", found.display()))
            .map_err(|_| ApkdError::ToolMissing(self.version_tool.display().to_string()))
    }

    /// Declared `versionName` of the APK, or [`UNKNOWN_VERSION`] when it
    /// cannot be determined.
    pub async fn extract_version(&self, staged: &StagedArtifact) -> String {
        let path = staged.path.to_string_lossy();
        let output = match run_command_async(
            &self.version_tool,
            &["dump", "badging", &*path],
            self.command_timeout,
        )
        .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!("Version extraction failed for {}: {}", staged.path.display(), e);
                return UNKNOWN_VERSION.to_string();
            }
        };
        if !output.success() {
            warn!(
                "Version tool exited with {:?} for {}",
                output.exit_code,
                staged.path.display()
            );
            return UNKNOWN_VERSION.to_string();
        }
        match parse_version_name(&output.stdout) {
            Some(version) => version,
            None => {
                warn!("No versionName in tool output for {}", staged.path.display());
                UNKNOWN_VERSION.to_string()
            }
        }
    }

    /// Atomically replaces the artifact served under `filename` with the
    /// staged file and makes it world-readable.
    pub async fn promote(
        &self,
        staged: &StagedArtifact,
        filename: &str,
    ) -> std::result::Result<u64, PromoteError> {
        validate_filename(filename)
            .map_err(|e| PromoteError::WriteDenied(filename.to_string(), e.to_string()))?;
        let target = self.artifact_path(filename);
        install_file_atomically_async(staged.path.clone(), target.clone(), WORLD_READABLE)
            .await
            .map_err(|e| {
                error!("Promotion to {} failed: {}", target.display(), e);
                PromoteError::WriteDenied(filename.to_string(), e.to_string())
            })
    }
}

pub(crate) fn parse_version_name(output: &str) -> Option<String> {
    VERSION_NAME
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}
