//! Contains the logic for the `update` command.
use apkd_common::error::Result;
use apkd_core::{Change, EntryOutcome};
use colored::Colorize;

use crate::context::AppContext;

#[derive(clap::Args, Debug)]
pub struct Update;

impl Update {
    pub async fn run(&self, ctx: &AppContext) -> Result<()> {
        tracing::debug!("Running manual update pass");
        println!("{}{}", "==> ".bold().blue(), "Checking catalog sources".bold());

        let report = ctx.reconciler.run_pass().await?;

        for entry in &report.entries {
            let line = match &entry.outcome {
                EntryOutcome::Committed(Change::Added { version }) => {
                    format!("{} {}: added {}", "✓".green(), entry.title, version)
                }
                EntryOutcome::Committed(Change::Updated { from, to }) => {
                    format!("{} {}: {} → {}", "✓".green(), entry.title, from, to)
                }
                EntryOutcome::Unchanged => format!("  {}: up to date", entry.title).dimmed().to_string(),
                EntryOutcome::NoSource => format!("  {}: manual only", entry.title).dimmed().to_string(),
                EntryOutcome::Downgrade {
                    candidate,
                    recorded,
                } => format!(
                    "{} {}: remote {} is older than {}, skipped",
                    "!".yellow(),
                    entry.title,
                    candidate,
                    recorded
                ),
                EntryOutcome::Failed(e) => format!(
                    "{} {}: {} ({})",
                    "✗".red(),
                    entry.title,
                    e.operator_reason(),
                    e
                ),
            };
            println!("{line}");
        }

        println!(
            "{}",
            format!(
                "{} updated, {} failed, {} checked",
                report.updated(),
                report.failed(),
                report.entries.len()
            )
            .bold()
        );
        Ok(())
    }
}
