// apkd-core/src/state.rs
//! Process-scoped update state: the single-pass guard, the global
//! update lock shared by the reconciler and manual intake, and the gate
//! that lets shutdown wait for promote-and-commit sequences to finish.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct UpdateState {
    pass_running: AtomicBool,
    update_lock: Mutex<()>,
    commit_gate: Arc<RwLock<()>>,
}

impl UpdateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a pass as running. Returns `None` when one already is; the
    /// caller must not queue the trigger.
    pub fn try_begin_pass(&self) -> Option<PassGuard<'_>> {
        if self
            .pass_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!("Reconciliation pass guard acquired");
            Some(PassGuard { state: self })
        } else {
            None
        }
    }

    pub fn is_pass_running(&self) -> bool {
        self.pass_running.load(Ordering::Acquire)
    }

    /// Held from fetch through commit of one entry, and by manual intake
    /// while it promotes.
    pub async fn lock_updates(&self) -> MutexGuard<'_, ()> {
        self.update_lock.lock().await
    }

    /// Held by every promote-and-commit sequence. Owned, so it can move
    /// into the task that runs the sequence.
    pub(crate) async fn begin_commit(&self) -> OwnedRwLockReadGuard<()> {
        Arc::clone(&self.commit_gate).read_owned().await
    }

    /// Waits for running commit sequences to finish. While the returned
    /// guard lives no new sequence starts.
    pub async fn quiesce(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.commit_gate).write_owned().await
    }
}

/// Clears the running flag when dropped, including on early return.
#[derive(Debug)]
pub struct PassGuard<'a> {
    state: &'a UpdateState,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.state.pass_running.store(false, Ordering::Release);
        debug!("Reconciliation pass guard released");
    }
}
