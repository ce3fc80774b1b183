// apkd-core/src/reconcile.rs
//! Reconciliation Engine: one pass over the catalog, each entry handled on
//! its own so that one failure never affects another.
use std::cmp::Ordering;
use std::sync::Arc;

use apkd_common::error::{ApkdError, Result};
use apkd_common::version;
use apkd_common::{AppRecord, Config, Notification};
use reqwest::Client;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::MetadataRepository;
use crate::commit::{promote_and_commit, Change, CommitPlan};
use crate::notifier::Notifier;
use crate::resolver::SourceResolver;
use crate::state::UpdateState;
use crate::store::{ArtifactStore, StagingArea};

/// How one catalog entry ended up after a pass.
#[derive(Debug, Clone)]
pub enum EntryOutcome {
    /// A new artifact was promoted and recorded.
    Committed(Change),
    /// The remote artifact is byte-identical to the stored one.
    Unchanged,
    /// The candidate declares an older version than the recorded one.
    Downgrade { candidate: String, recorded: String },
    /// Manual-only entry; the scheduler does not touch it.
    NoSource,
    Failed(ApkdError),
}

#[derive(Debug, Clone)]
pub struct EntryReport {
    pub title: String,
    pub outcome: EntryOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub entries: Vec<EntryReport>,
}

impl PassReport {
    pub fn updated(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, EntryOutcome::Committed(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, EntryOutcome::Failed(_)))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    resolver: SourceResolver,
    store: ArtifactStore,
    catalog: MetadataRepository,
    state: Arc<UpdateState>,
    notifier: Notifier,
}

impl Reconciler {
    /// `client` is used for both release APIs and downloads; its own
    /// timeout bounds downloads, API calls use the tighter config value.
    pub fn new(
        config: &Config,
        client: Client,
        state: Arc<UpdateState>,
        notifier: Notifier,
    ) -> Self {
        Self {
            resolver: SourceResolver::new(client.clone(), config),
            store: ArtifactStore::new(client, config),
            catalog: MetadataRepository::new(&config.catalog_path),
            state,
            notifier,
        }
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    /// Runs one pass now. Fails with `PassInProgress` when another pass is
    /// running, and with a fatal error when the catalog or the version tool
    /// is unavailable at the start. Per-entry failures are reported, not
    /// returned; a fatal one (the catalog turned unreadable) ends the pass
    /// early.
    #[instrument(skip_all, name = "reconcile_pass")]
    pub async fn run_pass(&self) -> Result<PassReport> {
        let _guard = self.state.try_begin_pass().ok_or_else(|| {
            info!("Update pass requested while one is running; ignoring");
            ApkdError::PassInProgress
        })?;

        let catalog = match self.prepare().await {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Update pass aborted: {}", e);
                if e.is_fatal_for_pass() {
                    self.notifier
                        .send(Notification::failed("update pass", &e));
                }
                return Err(e);
            }
        };
        let staging = self.store.open_staging()?;

        info!("Starting update pass over {} entries", catalog.len());
        let mut report = PassReport::default();
        for (index, app) in catalog.apps.iter().enumerate() {
            let outcome = self.reconcile_entry(&staging, index, app).await;
            self.report_outcome(app, &outcome);
            let fatal = matches!(&outcome, EntryOutcome::Failed(e) if e.is_fatal_for_pass());
            report.entries.push(EntryReport {
                title: app.title.clone(),
                outcome,
            });
            if fatal {
                error!("Catalog became unavailable mid-pass; remaining entries skipped");
                break;
            }
        }
        drop(staging);

        let updated = report.updated();
        info!(
            "Update pass finished: {} updated, {} failed",
            updated,
            report.failed()
        );
        if updated > 0 {
            self.notifier.send(Notification::PassSummary { updated });
        }
        Ok(report)
    }

    async fn prepare(&self) -> Result<apkd_common::Catalog> {
        let catalog = self.catalog.load().await?;
        self.store.ensure_tool_present()?;
        Ok(catalog)
    }

    #[instrument(skip_all, fields(title = %app.title))]
    async fn reconcile_entry(
        &self,
        staging: &StagingArea,
        index: usize,
        app: &AppRecord,
    ) -> EntryOutcome {
        match self.try_reconcile_entry(staging, index, app).await {
            Ok(outcome) => outcome,
            Err(e) => EntryOutcome::Failed(e),
        }
    }

    async fn try_reconcile_entry(
        &self,
        staging: &StagingArea,
        index: usize,
        app: &AppRecord,
    ) -> Result<EntryOutcome> {
        let descriptor = match app.source() {
            None => {
                debug!("No automatic source, skipping");
                return Ok(EntryOutcome::NoSource);
            }
            Some(descriptor) => descriptor?,
        };
        let filename = app.canonical_filename()?;
        let url = self.resolver.resolve(&descriptor).await?;

        let _lock = self.state.lock_updates().await;
        let staged = self.store.fetch(staging, &url).await?;
        let digest = self.store.hash(&staged).await?;
        let current = self.store.current_hash(&filename).await?;

        let previous = match current {
            None => None,
            Some(existing) if existing == digest => {
                debug!("Artifact {} unchanged ({})", filename, digest);
                return Ok(EntryOutcome::Unchanged);
            }
            Some(_) => Some(app.version_or_unknown()),
        };

        // Unknown compares as "0": an unreadable build never replaces a
        // known recorded version.
        let version = self.store.extract_version(&staged).await;
        if let Some(recorded) = previous {
            if version::compare(&version, recorded) == Ordering::Less {
                warn!(
                    "Candidate version {} is older than recorded {}, skipping",
                    version, recorded
                );
                return Ok(EntryOutcome::Downgrade {
                    candidate: version,
                    recorded: recorded.to_string(),
                });
            }
        }

        let change = promote_and_commit(
            &self.state,
            &self.store,
            &self.catalog,
            &staged,
            CommitPlan {
                index,
                title: app.title.clone(),
                filename,
                previous: previous.map(str::to_string),
                version,
            },
        )
        .await?;
        Ok(EntryOutcome::Committed(change))
    }

    fn report_outcome(&self, app: &AppRecord, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Committed(change) => {
                info!("{}: now at version {}", app.title, change.version());
                self.notifier.send(change.notification(&app.title));
            }
            EntryOutcome::Failed(e) => {
                error!("{}: update failed: {}", app.title, e);
                self.notifier.send(Notification::failed(&app.title, e));
            }
            EntryOutcome::Unchanged | EntryOutcome::NoSource | EntryOutcome::Downgrade { .. } => {}
        }
    }
}
