use std::sync::Arc;

use apkd_common::error::{ApkdError, Result};
use clap::Args;
use tracing::{info, warn};

use crate::bot::Bot;
use crate::context::AppContext;
use crate::scheduler::run_scheduler;

#[derive(Args, Debug)]
pub struct Serve {
    /// Do not start the Telegram bot even if a token is configured
    #[arg(long)]
    pub no_bot: bool,
}

impl Serve {
    pub async fn run(&self, ctx: Arc<AppContext>) -> Result<()> {
        let mut tasks = vec![tokio::spawn(run_scheduler(Arc::clone(&ctx)))];

        match (&ctx.telegram, self.no_bot) {
            (Some(tg), false) => {
                if ctx.config.admin_id.is_none() {
                    warn!("ADMIN_ID is not set; the bot will refuse every request");
                }
                let bot = Bot::new(Arc::clone(&ctx), tg.clone());
                tasks.push(tokio::spawn(bot.run()));
            }
            (None, false) => info!("TELEGRAM_BOT_TOKEN not set, bot disabled"),
            (_, true) => info!("Bot disabled by --no-bot"),
        }

        info!("apkd serving catalog {}", ctx.config.catalog_path.display());
        let signal = tokio::signal::ctrl_c().await;
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }
        // Aborting stops new work; a promote already under way still gets
        // its catalog record. The gate stays closed until exit.
        info!("Shutting down, waiting for running commits");
        let _quiet = ctx.state.quiesce().await;
        signal.map_err(|e| ApkdError::Generic(format!("failed to wait for Ctrl-C: {e}")))?;
        info!("Shutdown complete");
        Ok(())
    }
}
