// apkd-core/src/commit.rs
//! The promote-then-record sequence shared by scheduled passes and manual
//! intake. Callers hold the update lock around it.
use apkd_common::error::{ApkdError, Result};
use apkd_common::Notification;
use tracing::info;

use crate::catalog::{timestamp_now, MetadataRepository};
use crate::state::UpdateState;
use crate::store::{ArtifactStore, StagedArtifact};

/// What a successful commit did to an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// No artifact existed before.
    Added { version: String },
    /// An artifact was replaced; `from == to` is a rebuild.
    Updated { from: String, to: String },
}

impl Change {
    pub fn version(&self) -> &str {
        match self {
            Change::Added { version } => version,
            Change::Updated { to, .. } => to,
        }
    }

    pub fn notification(&self, title: &str) -> Notification {
        match self {
            Change::Added { version } => Notification::Added {
                title: title.to_string(),
                version: version.clone(),
            },
            Change::Updated { from, to } => Notification::Updated {
                title: title.to_string(),
                from: from.clone(),
                to: to.clone(),
            },
        }
    }
}

pub(crate) struct CommitPlan {
    pub index: usize,
    pub title: String,
    pub filename: String,
    /// Recorded version before the update, `None` when nothing was stored.
    pub previous: Option<String>,
    pub version: String,
}

/// Promotes the staged file, then records the new version. A failed
/// promotion leaves the catalog untouched; a failed catalog write leaves
/// the old catalog in place.
///
/// The sequence runs in its own task under the commit gate: once started
/// it completes even if the caller is dropped, so a promoted artifact is
/// never left without its catalog record.
pub(crate) async fn promote_and_commit(
    state: &UpdateState,
    store: &ArtifactStore,
    catalog: &MetadataRepository,
    staged: &StagedArtifact,
    plan: CommitPlan,
) -> Result<Change> {
    let gate = state.begin_commit().await;
    let store = store.clone();
    let catalog = catalog.clone();
    let staged = staged.clone();
    tokio::spawn(async move {
        let _gate = gate;
        run_commit(&store, &catalog, &staged, plan).await
    })
    .await
    .map_err(|e| ApkdError::Generic(format!("commit task failed: {e}")))?
}

async fn run_commit(
    store: &ArtifactStore,
    catalog: &MetadataRepository,
    staged: &StagedArtifact,
    plan: CommitPlan,
) -> Result<Change> {
    let bytes = store.promote(staged, &plan.filename).await?;
    catalog
        .commit(plan.index, &plan.title, &plan.version, &timestamp_now())
        .await?;
    info!(
        "Committed {} ({} bytes) as version {}",
        plan.filename, bytes, plan.version
    );
    Ok(match plan.previous {
        None => Change::Added {
            version: plan.version,
        },
        Some(from) => Change::Updated {
            from,
            to: plan.version,
        },
    })
}

#[cfg(test)]
mod tests {
    use apkd_common::Config;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn commit_finishes_when_caller_is_dropped() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::with_root(root.path());
        std::fs::create_dir_all(config.catalog_path.parent().unwrap()).unwrap();
        std::fs::write(
            &config.catalog_path,
            serde_json::to_vec(&json!({"apps": [{"title": "Kino", "url": "/apks/Kino.apk"}]}))
                .unwrap(),
        )
        .unwrap();
        let upload = root.path().join("upload.apk");
        std::fs::write(&upload, b"new-build").unwrap();

        let state = UpdateState::new();
        let store = ArtifactStore::new(reqwest::Client::new(), &config);
        let repo = MetadataRepository::new(&config.catalog_path);
        let staged = StagedArtifact::from_local(upload).await.unwrap();
        let plan = CommitPlan {
            index: 0,
            title: "Kino".into(),
            filename: "Kino.apk".into(),
            previous: None,
            version: "2.0".into(),
        };

        // Polled once, then abandoned while the sequence is in flight.
        let finished = tokio::select! {
            biased;
            _ = promote_and_commit(&state, &store, &repo, &staged, plan) => true,
            _ = std::future::ready(()) => false,
        };
        assert!(!finished);

        // Shutdown waits on the gate; after it both halves are in place.
        drop(state.quiesce().await);
        assert_eq!(
            std::fs::read(store.artifact_path("Kino.apk")).unwrap(),
            b"new-build"
        );
        let catalog = repo.load().await.unwrap();
        assert_eq!(catalog.apps[0].version.as_deref(), Some("2.0"));
    }

    #[test]
    fn change_renders_as_notification() {
        let change = Change::Updated {
            from: "1.0".into(),
            to: "1.0".into(),
        };
        assert_eq!(change.version(), "1.0");
        assert_eq!(
            change.notification("Kino"),
            Notification::Updated {
                title: "Kino".into(),
                from: "1.0".into(),
                to: "1.0".into()
            }
        );
    }
}
