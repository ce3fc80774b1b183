// apkd-core/src/lib.rs

pub mod catalog;
mod commit;
pub mod intake;
pub mod notifier;
pub mod reconcile;
pub mod resolver;
pub mod state;
pub mod store;

// Re-export key types for the binary crate
pub use catalog::{timestamp_now, MetadataRepository};
pub use commit::Change;
pub use intake::{Candidate, ConfirmReason, IntakeHandler, IntakeOutcome, Submission, PENDING_TTL};
pub use notifier::Notifier;
pub use reconcile::{EntryOutcome, EntryReport, PassReport, Reconciler};
pub use resolver::SourceResolver;
pub use state::{PassGuard, UpdateState};
pub use store::{ArtifactStore, StagedArtifact, StagingArea};
