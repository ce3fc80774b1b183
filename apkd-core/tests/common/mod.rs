#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use apkd_common::{Catalog, Config, Notification};
use apkd_core::{IntakeHandler, Notifier, Reconciler, Submission, UpdateState};
use reqwest::Client;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub const ADMIN: i64 = 4242;

/// A temporary deployment root with a fake version tool whose reported
/// version is read from `<root>/tool-version`.
pub struct TestEnv {
    pub root: TempDir,
    pub config: Config,
    pub state: Arc<UpdateState>,
    pub notifier: Notifier,
    pub notifications: UnboundedReceiver<Notification>,
}

impl TestEnv {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = Config::with_root(root.path());
        config.admin_id = Some(ADMIN);
        config.api_timeout = Duration::from_secs(5);
        config.command_timeout = Duration::from_secs(10);

        let tool = root.path().join("fake-aapt");
        let version_file = root.path().join("tool-version");
        std::fs::write(
            &tool,
            format!(
                "#!/bin/sh\nv=$(cat '{}' 2>/dev/null)\nif [ -z \"$v\" ]; then echo 'ERROR: dump failed' >&2; exit 1; fi\necho \"package: name='org.example' versionCode='1' versionName='$v'\"\n",
                version_file.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        config.version_tool = tool;

        let (notifier, notifications) = Notifier::channel();
        Self {
            root,
            config,
            state: Arc::new(UpdateState::new()),
            notifier,
            notifications,
        }
    }

    /// Version the fake tool reports from now on; `None` makes it fail.
    pub fn set_tool_version(&self, version: Option<&str>) {
        let path = self.root.path().join("tool-version");
        match version {
            Some(v) => std::fs::write(path, v).unwrap(),
            None => {
                let _ = std::fs::remove_file(path);
            }
        }
    }

    pub fn write_catalog(&self, value: Value) {
        std::fs::create_dir_all(self.config.catalog_path.parent().unwrap()).unwrap();
        std::fs::write(
            &self.config.catalog_path,
            serde_json::to_vec_pretty(&value).unwrap(),
        )
        .unwrap();
    }

    pub fn catalog(&self) -> Catalog {
        serde_json::from_slice(&std::fs::read(&self.config.catalog_path).unwrap()).unwrap()
    }

    pub fn artifact(&self, filename: &str) -> Option<Vec<u8>> {
        std::fs::read(self.config.apks_dir.join(filename)).ok()
    }

    pub fn put_artifact(&self, filename: &str, content: &[u8]) {
        std::fs::create_dir_all(&self.config.apks_dir).unwrap();
        std::fs::write(self.config.apks_dir.join(filename), content).unwrap();
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            &self.config,
            Client::new(),
            Arc::clone(&self.state),
            self.notifier.clone(),
        )
    }

    pub fn intake(&self) -> IntakeHandler {
        IntakeHandler::new(
            &self.config,
            Client::new(),
            Arc::clone(&self.state),
            self.notifier.clone(),
        )
    }

    /// Copies `content` into a fresh intake scratch directory.
    pub fn submission(&self, handler: &IntakeHandler, hint: &str, content: &[u8]) -> Submission {
        let scratch = handler.scratch_dir().unwrap();
        let artifact = scratch.path().join("upload.apk");
        std::fs::write(&artifact, content).unwrap();
        Submission {
            submitter: ADMIN,
            filename_hint: hint.to_string(),
            scratch,
            artifact,
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }

    pub fn tmp_entries(&self) -> Vec<PathBuf> {
        list_dir(&self.config.tmp_dir())
    }
}

pub fn list_dir(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}
