// apkd-core/src/intake.rs
//! Manual Intake Handler.
//!
//! An operator-submitted APK is matched to a catalog entry by filename.
//! Whenever the handler needs a human decision (which entry, or whether to
//! replace with an older or same version) it parks the upload in a pending
//! record keyed by a random id and returns. The answer arrives later through
//! [`IntakeHandler::select`], [`IntakeHandler::confirm`] or
//! [`IntakeHandler::cancel`]; nothing is held while waiting except the
//! upload's own scratch directory.
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use apkd_common::error::{ApkdError, CommitError, Result};
use apkd_common::version::{self, is_unknown};
use apkd_common::{Catalog, Config, Notification};
use reqwest::Client;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::MetadataRepository;
use crate::commit::{promote_and_commit, Change, CommitPlan};
use crate::notifier::Notifier;
use crate::state::UpdateState;
use crate::store::{ArtifactStore, StagedArtifact};

/// An uploaded file and the scratch directory that owns it.
#[derive(Debug)]
pub struct Submission {
    pub submitter: i64,
    /// Name the operator gave the file; used for matching only.
    pub filename_hint: String,
    pub scratch: TempDir,
    pub artifact: PathBuf,
}

/// How long an unanswered upload is kept before its scratch space is
/// reclaimed.
pub const PENDING_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub index: usize,
    pub title: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmReason {
    /// The upload declares an older version than the catalog.
    Older,
    /// Same declared version; replacing is a rebuild.
    SameVersion,
    /// The upload's version could not be read.
    UnknownVersion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// The operator must pick one of `candidates`. `matched` is false when
    /// nothing matched and the whole catalog is offered.
    NeedsSelection {
        id: Uuid,
        candidates: Vec<Candidate>,
        matched: bool,
    },
    /// The operator must confirm replacing `recorded` with `submitted`.
    NeedsConfirmation {
        id: Uuid,
        title: String,
        recorded: String,
        submitted: String,
        reason: ConfirmReason,
    },
    Committed { title: String, change: Change },
    Cancelled,
}

#[derive(Debug)]
enum Stage {
    /// Offered entries as `(index, title)` at the time of the offer.
    Selection { candidates: Vec<(usize, String)> },
    Confirmation { index: usize, title: String, version: String },
}

#[derive(Debug)]
struct PendingIntake {
    submitter: i64,
    received: Instant,
    // Dropping the record removes the upload.
    _scratch: TempDir,
    staged: StagedArtifact,
    stage: Stage,
}

#[derive(Debug)]
pub struct IntakeHandler {
    admin_id: Option<i64>,
    tmp_root: PathBuf,
    store: ArtifactStore,
    catalog: MetadataRepository,
    state: Arc<UpdateState>,
    notifier: Notifier,
    pending: Mutex<HashMap<Uuid, PendingIntake>>,
}

impl IntakeHandler {
    pub fn new(
        config: &Config,
        client: Client,
        state: Arc<UpdateState>,
        notifier: Notifier,
    ) -> Self {
        Self {
            admin_id: config.admin_id,
            tmp_root: config.tmp_dir(),
            store: ArtifactStore::new(client, config),
            catalog: MetadataRepository::new(&config.catalog_path),
            state,
            notifier,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_authorized(&self, submitter: i64) -> bool {
        self.admin_id == Some(submitter)
    }

    fn authorize(&self, submitter: i64) -> Result<()> {
        if self.is_authorized(submitter) {
            Ok(())
        } else {
            warn!("Rejected intake request from {}", submitter);
            Err(ApkdError::NotAuthorized(submitter))
        }
    }

    /// Fresh scratch directory for an upload about to be submitted.
    pub fn scratch_dir(&self) -> Result<TempDir> {
        std::fs::create_dir_all(&self.tmp_root)?;
        Ok(tempfile::Builder::new()
            .prefix("intake-")
            .tempdir_in(&self.tmp_root)?)
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    #[instrument(skip_all, fields(submitter = submission.submitter, hint = %submission.filename_hint))]
    pub async fn submit(&self, submission: Submission) -> Result<IntakeOutcome> {
        self.authorize(submission.submitter)?;
        self.sweep_expired(PENDING_TTL).await;
        let staged = StagedArtifact::from_local(submission.artifact.clone()).await?;
        let catalog = self.catalog.load().await?;
        if catalog.is_empty() {
            return Err(ApkdError::NoMatch);
        }

        let matches = match_titles(&catalog, &submission.filename_hint);
        debug!("{} catalog entries match", matches.len());
        let pending = PendingIntake {
            submitter: submission.submitter,
            received: Instant::now(),
            _scratch: submission.scratch,
            staged,
            stage: Stage::Selection {
                candidates: Vec::new(),
            },
        };

        match matches.len() {
            1 => {
                let index = matches[0];
                let title = catalog.apps[index].title.clone();
                self.proceed(pending, None, index, &title).await
            }
            0 => {
                let all: Vec<usize> = (0..catalog.len()).collect();
                self.park_selection(pending, &catalog, all, false).await
            }
            _ => self.park_selection(pending, &catalog, matches, true).await,
        }
    }

    /// Picks the catalog entry at `index` for a pending selection.
    pub async fn select(&self, submitter: i64, id: Uuid, index: usize) -> Result<IntakeOutcome> {
        let pending = self.take_pending(submitter, id).await?;
        let picked = match &pending.stage {
            Stage::Selection { candidates } => candidates
                .iter()
                .find(|(offered, _)| *offered == index)
                .map(|(_, title)| title.clone())
                .ok_or_else(|| format!("entry {index} was not offered")),
            Stage::Confirmation { .. } => {
                Err("this upload awaits confirmation, not a selection".to_string())
            }
        };
        let title = match picked {
            Ok(title) => title,
            Err(problem) => {
                self.pending.lock().await.insert(id, pending);
                return Err(ApkdError::InvalidSelection(problem));
            }
        };
        self.proceed(pending, Some(id), index, &title).await
    }

    /// Accepts a pending older-or-same-version replacement.
    pub async fn confirm(&self, submitter: i64, id: Uuid) -> Result<IntakeOutcome> {
        let pending = self.take_pending(submitter, id).await?;
        let target = match &pending.stage {
            Stage::Confirmation {
                index,
                title,
                version,
            } => Some((*index, title.clone(), version.clone())),
            Stage::Selection { .. } => None,
        };
        let Some((index, title, version)) = target else {
            self.pending.lock().await.insert(id, pending);
            return Err(ApkdError::InvalidSelection(
                "pick an app before confirming".to_string(),
            ));
        };

        let _lock = self.state.lock_updates().await;
        let catalog = self.catalog.load().await?;
        let index = catalog
            .position_of(index, &title)
            .ok_or_else(|| CommitError::MissingEntry(index, title.clone()))?;
        self.commit(&pending.staged, &catalog, index, version).await
    }

    pub async fn cancel(&self, submitter: i64, id: Uuid) -> Result<IntakeOutcome> {
        let pending = self.take_pending(submitter, id).await?;
        drop(pending);
        info!("Pending upload {} cancelled", id);
        Ok(IntakeOutcome::Cancelled)
    }

    /// Drops uploads that have waited longer than `max_age` for an answer.
    pub async fn sweep_expired(&self, max_age: Duration) -> usize {
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|id, p| {
            let keep = p.received.elapsed() < max_age;
            if !keep {
                info!("Discarding unanswered upload {}", id);
            }
            keep
        });
        before - pending.len()
    }

    /// Drops every pending upload of `submitter`.
    pub async fn cancel_all(&self, submitter: i64) -> usize {
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|_, p| p.submitter != submitter);
        before - pending.len()
    }

    async fn take_pending(&self, submitter: i64, id: Uuid) -> Result<PendingIntake> {
        self.authorize(submitter)?;
        let mut pending = self.pending.lock().await;
        match pending.remove(&id) {
            Some(p) if p.submitter == submitter => Ok(p),
            Some(p) => {
                pending.insert(id, p);
                Err(ApkdError::NotAuthorized(submitter))
            }
            None => Err(ApkdError::PendingNotFound(id.to_string())),
        }
    }

    async fn park_selection(
        &self,
        mut pending: PendingIntake,
        catalog: &Catalog,
        indices: Vec<usize>,
        matched: bool,
    ) -> Result<IntakeOutcome> {
        let candidates: Vec<Candidate> = indices
            .iter()
            .filter_map(|&index| {
                catalog.get(index).map(|app| Candidate {
                    index,
                    title: app.title.clone(),
                    version: app.version_or_unknown().to_string(),
                })
            })
            .collect();
        pending.stage = Stage::Selection {
            candidates: candidates
                .iter()
                .map(|c| (c.index, c.title.clone()))
                .collect(),
        };
        let id = Uuid::new_v4();
        self.pending.lock().await.insert(id, pending);
        info!("Upload {} awaits selection", id);
        Ok(IntakeOutcome::NeedsSelection {
            id,
            candidates,
            matched,
        })
    }

    /// Target chosen: extract, compare, then commit or ask. The entry is
    /// located by `title` in the current catalog; `index` is where it was
    /// when offered. When it is gone, a parked upload (`id`) is kept.
    async fn proceed(
        &self,
        mut pending: PendingIntake,
        id: Option<Uuid>,
        index: usize,
        title: &str,
    ) -> Result<IntakeOutcome> {
        let _lock = self.state.lock_updates().await;
        let catalog = self.catalog.load().await?;
        let Some(index) = catalog.position_of(index, title) else {
            warn!("'{}' is no longer in the catalog", title);
            if let Some(id) = id {
                self.pending.lock().await.insert(id, pending);
            }
            return Err(ApkdError::InvalidSelection(format!(
                "'{title}' is no longer in the catalog"
            )));
        };
        let app = &catalog.apps[index];
        let version = self.store.extract_version(&pending.staged).await;

        let recorded = app.version.as_deref().filter(|v| !is_unknown(v));
        let reason = match recorded {
            None => None,
            Some(_) if is_unknown(&version) => Some(ConfirmReason::UnknownVersion),
            Some(recorded) => match version::compare(&version, recorded) {
                Ordering::Greater => None,
                Ordering::Equal => Some(ConfirmReason::SameVersion),
                Ordering::Less => Some(ConfirmReason::Older),
            },
        };

        let Some(reason) = reason else {
            return self.commit(&pending.staged, &catalog, index, version).await;
        };

        let id = Uuid::new_v4();
        let outcome = IntakeOutcome::NeedsConfirmation {
            id,
            title: app.title.clone(),
            recorded: app.version_or_unknown().to_string(),
            submitted: version.clone(),
            reason,
        };
        pending.stage = Stage::Confirmation {
            index,
            title: app.title.clone(),
            version,
        };
        self.pending.lock().await.insert(id, pending);
        info!("Upload {} for '{}' awaits confirmation ({:?})", id, app.title, reason);
        Ok(outcome)
    }

    async fn commit(
        &self,
        staged: &StagedArtifact,
        catalog: &Catalog,
        index: usize,
        version: String,
    ) -> Result<IntakeOutcome> {
        let Some(app) = catalog.get(index) else {
            return Err(ApkdError::InvalidSelection(format!("no catalog entry {index}")));
        };
        let result = self.try_commit(staged, app, index, version).await;
        match result {
            Ok(change) => {
                self.notifier.send(change.notification(&app.title));
                Ok(IntakeOutcome::Committed {
                    title: app.title.clone(),
                    change,
                })
            }
            Err(e) => {
                self.notifier.send(Notification::failed(&app.title, &e));
                Err(e)
            }
        }
    }

    async fn try_commit(
        &self,
        staged: &StagedArtifact,
        app: &apkd_common::AppRecord,
        index: usize,
        version: String,
    ) -> Result<Change> {
        let filename = app.canonical_filename()?;
        let had_artifact = self.store.current_hash(&filename).await?.is_some();
        promote_and_commit(
            &self.state,
            &self.store,
            &self.catalog,
            staged,
            CommitPlan {
                index,
                title: app.title.clone(),
                filename,
                previous: had_artifact.then(|| app.version_or_unknown().to_string()),
                version,
            },
        )
        .await
    }
}

/// Indices of entries whose title occurs in `hint`, ignoring case. The
/// hint is also tried without its extension and with `_`/`-` read as
/// spaces. Short titles can over-match; ambiguity is resolved by asking.
pub fn match_titles(catalog: &Catalog, hint: &str) -> Vec<usize> {
    let raw = hint.to_lowercase();
    let stem = Path::new(hint)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| hint.to_string());
    let spaced = stem.replace(['_', '-'], " ").to_lowercase();

    catalog
        .apps
        .iter()
        .enumerate()
        .filter(|(_, app)| {
            let title = app.title.trim().to_lowercase();
            !title.is_empty() && (raw.contains(&title) || spaced.contains(&title))
        })
        .map(|(index, _)| index)
        .collect()
}

trait CatalogExt {
    fn position_of(&self, index: usize, title: &str) -> Option<usize>;
}

impl CatalogExt for Catalog {
    /// `index` if it still holds `title`, otherwise wherever `title` moved.
    fn position_of(&self, index: usize, title: &str) -> Option<usize> {
        match self.get(index) {
            Some(app) if app.title == title => Some(index),
            _ => self.apps.iter().position(|app| app.title == title),
        }
    }
}
