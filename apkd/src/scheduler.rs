// apkd/src/scheduler.rs
use std::sync::Arc;

use apkd_common::error::ApkdError;
use apkd_core::{PassReport, PENDING_TTL};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::context::AppContext;

/// Runs a pass now and then once per configured interval. Never returns.
pub async fn run_scheduler(ctx: Arc<AppContext>) {
    info!(
        "Scheduler started, checking for updates every {}",
        humantime::format_duration(ctx.config.check_interval)
    );
    let mut ticker = tokio::time::interval(ctx.config.check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        trigger_pass(&ctx).await;
        let dropped = ctx.intake.sweep_expired(PENDING_TTL).await;
        if dropped > 0 {
            info!("Discarded {} unanswered upload(s)", dropped);
        }
    }
}

/// One pass, with the result logged. A pass that is already running makes
/// this a no-op.
pub async fn trigger_pass(ctx: &AppContext) -> Option<PassReport> {
    match ctx.reconciler.run_pass().await {
        Ok(report) => Some(report),
        Err(ApkdError::PassInProgress) => {
            info!("Scheduled pass skipped: previous pass still running");
            None
        }
        Err(e) => {
            error!("Update pass failed: {}", e);
            None
        }
    }
}
