// apkd-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::error::{ApkdError, Result};

// Fallback if APKD_ROOT is not set or is empty.
const DEFAULT_ROOT: &str = "/opt/web-serv";
const DEFAULT_VERSION_TOOL: &str = "/usr/bin/aapt";
const DEFAULT_CHECK_INTERVAL_HOURS: u64 = 6;

const API_TIMEOUT_SECS: u64 = 30;
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const COMMAND_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub catalog_path: PathBuf,
    pub apks_dir: PathBuf,
    /// Binary-inspection tool, invoked as `<tool> dump badging <apk>`.
    pub version_tool: PathBuf,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    /// The single trusted operator identity.
    pub admin_id: Option<i64>,
    pub server_domain: Option<String>,
    pub check_interval: Duration,
    pub api_timeout: Duration,
    pub download_timeout: Duration,
    pub command_timeout: Duration,
    pub max_upload_bytes: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading apkd configuration");

        let root = env_non_empty("APKD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                debug!(
                    "APKD_ROOT not set or empty, falling back to default: {}",
                    DEFAULT_ROOT
                );
                PathBuf::from(DEFAULT_ROOT)
            });

        let mut config = Self::with_root(&root);

        if let Some(path) = env_non_empty("APKD_CATALOG") {
            config.catalog_path = PathBuf::from(path);
        }
        if let Some(path) = env_non_empty("APKD_APKS_DIR") {
            config.apks_dir = PathBuf::from(path);
        }
        if let Some(tool) = env_non_empty("APKD_VERSION_TOOL") {
            config.version_tool = PathBuf::from(tool);
        }

        config.telegram_bot_token = env_non_empty("TELEGRAM_BOT_TOKEN");
        config.telegram_chat_id = env_non_empty("TELEGRAM_CHAT_ID");
        config.server_domain = env_non_empty("APKD_SERVER_DOMAIN");

        config.admin_id = match env_non_empty("ADMIN_ID") {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|e| {
                ApkdError::Config(format!("ADMIN_ID must be an integer, got '{raw}': {e}"))
            })?),
            None => None,
        };

        if let Some(raw) = env_non_empty("UPDATE_CHECK_INTERVAL_HOURS") {
            let hours = raw.trim().parse::<u64>().map_err(|e| {
                ApkdError::Config(format!(
                    "UPDATE_CHECK_INTERVAL_HOURS must be a whole number, got '{raw}': {e}"
                ))
            })?;
            if hours == 0 {
                return Err(ApkdError::Config(
                    "UPDATE_CHECK_INTERVAL_HOURS must be at least 1".to_string(),
                ));
            }
            config.check_interval = Duration::from_secs(hours * 3600);
        }

        debug!(
            "Configuration loaded: root={}, catalog={}, apks={}, check every {}",
            config.root.display(),
            config.catalog_path.display(),
            config.apks_dir.display(),
            humantime::format_duration(config.check_interval)
        );
        Ok(config)
    }

    /// Configuration with every path derived from `root` and every optional
    /// integration switched off.
    pub fn with_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            catalog_path: root.join("config").join("apps.json"),
            apks_dir: root.join("apks"),
            version_tool: PathBuf::from(DEFAULT_VERSION_TOOL),
            telegram_bot_token: None,
            telegram_chat_id: None,
            admin_id: None,
            server_domain: None,
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_HOURS * 3600),
            api_timeout: Duration::from_secs(API_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(COMMAND_TIMEOUT_SECS),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Scratch space for reconciliation passes and pending uploads.
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        self.apks_dir.join(filename)
    }

    /// Public download URL for a newly registered artifact.
    pub fn public_download_url(&self, filename: &str) -> String {
        match &self.server_domain {
            Some(domain) => format!("http://{domain}/apks/{filename}"),
            None => format!("/apks/{filename}"),
        }
    }

    pub fn telegram_enabled(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_root() {
        let config = Config::with_root(Path::new("/srv/apkd"));
        assert_eq!(config.catalog_path, PathBuf::from("/srv/apkd/config/apps.json"));
        assert_eq!(config.artifact_path("App.apk"), PathBuf::from("/srv/apkd/apks/App.apk"));
        assert_eq!(config.tmp_dir(), PathBuf::from("/srv/apkd/tmp"));
        assert!(!config.telegram_enabled());
    }

    #[test]
    fn public_url_uses_domain_when_known() {
        let mut config = Config::with_root(Path::new("/srv/apkd"));
        assert_eq!(config.public_download_url("Foo.apk"), "/apks/Foo.apk");
        config.server_domain = Some("apps.example.org".into());
        assert_eq!(
            config.public_download_url("Foo.apk"),
            "http://apps.example.org/apks/Foo.apk"
        );
    }
}
