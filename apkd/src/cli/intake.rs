use std::path::PathBuf;

use apkd_common::error::{ApkdError, Result};
use apkd_core::{IntakeOutcome, Submission};
use clap::Args;
use colored::Colorize;
use dialoguer::{Confirm, Select};
use uuid::Uuid;

use crate::bot::render::confirmation_prompt;
use crate::context::AppContext;

#[derive(Args, Debug)]
pub struct Intake {
    /// APK file to publish
    pub file: PathBuf,

    /// Name to match against catalog titles instead of the file name
    #[arg(long)]
    pub name: Option<String>,
}

enum Answer {
    Select(Uuid, usize),
    Confirm(Uuid),
    Cancel(Uuid),
}

async fn ask<T, F>(prompt: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(prompt)
        .await
        .map_err(|e| ApkdError::Generic(format!("prompt task failed: {e}")))?
        .map_err(|e| ApkdError::Generic(format!("prompt failed: {e}")))
}

impl Intake {
    pub async fn run(&self, ctx: &AppContext) -> Result<()> {
        // The local shell acts as the trusted operator.
        let operator = ctx.config.admin_id.ok_or_else(|| {
            ApkdError::Config("ADMIN_ID must be set to publish uploads".to_string())
        })?;
        let hint = match &self.name {
            Some(name) => name.clone(),
            None => self
                .file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    ApkdError::ValidationError(format!("{} is not a file", self.file.display()))
                })?,
        };

        let scratch = ctx.intake.scratch_dir()?;
        let artifact = scratch.path().join("upload.apk");
        tokio::fs::copy(&self.file, &artifact).await?;

        let mut outcome = ctx
            .intake
            .submit(Submission {
                submitter: operator,
                filename_hint: hint,
                scratch,
                artifact,
            })
            .await?;

        loop {
            let answer = match outcome {
                IntakeOutcome::Committed { title, change } => {
                    println!(
                        "{} {} is now at version {}",
                        "✓".green(),
                        title.bold(),
                        change.version()
                    );
                    return Ok(());
                }
                IntakeOutcome::Cancelled => {
                    println!("{}", "Upload discarded".yellow());
                    return Ok(());
                }
                IntakeOutcome::NeedsSelection {
                    id,
                    candidates,
                    matched,
                } => {
                    let prompt = if matched {
                        "Several apps match this file, pick one"
                    } else {
                        "No app matches this file name, pick one"
                    };
                    let mut items: Vec<String> = candidates
                        .iter()
                        .map(|c| format!("{} ({})", c.title, c.version))
                        .collect();
                    items.push("Cancel".to_string());
                    let choice = ask(move || {
                        Select::new()
                            .with_prompt(prompt)
                            .items(&items)
                            .default(0)
                            .interact()
                    })
                    .await?;
                    match candidates.get(choice) {
                        Some(candidate) => Answer::Select(id, candidate.index),
                        None => Answer::Cancel(id),
                    }
                }
                IntakeOutcome::NeedsConfirmation {
                    id,
                    title,
                    recorded,
                    submitted,
                    reason,
                } => {
                    let prompt = confirmation_prompt(&title, &recorded, &submitted, reason);
                    let yes = ask(move || {
                        Confirm::new()
                            .with_prompt(prompt)
                            .default(false)
                            .interact()
                    })
                    .await?;
                    if yes {
                        Answer::Confirm(id)
                    } else {
                        Answer::Cancel(id)
                    }
                }
            };

            outcome = match answer {
                Answer::Select(id, index) => ctx.intake.select(operator, id, index).await?,
                Answer::Confirm(id) => ctx.intake.confirm(operator, id).await?,
                Answer::Cancel(id) => ctx.intake.cancel(operator, id).await?,
            };
        }
    }
}
