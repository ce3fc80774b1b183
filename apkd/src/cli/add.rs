use std::path::PathBuf;

use apkd_common::error::{ApkdError, Result};
use apkd_common::{AppRecord, Catalog, Notification, SourceMethod};
use apkd_core::{timestamp_now, StagedArtifact};
use apkd_net::validate_url;
use clap::Args;
use colored::Colorize;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::context::AppContext;

static TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("title pattern is valid"));

#[derive(Args, Debug)]
pub struct Add {
    /// APK file to publish
    pub file: PathBuf,

    /// Catalog title; also names the published file (<title>.apk)
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    /// Direct download URL to check for updates; without it the entry is
    /// manual-only
    #[arg(long, value_name = "URL")]
    pub direct: Option<String>,
}

pub(crate) fn validate_title(title: &str) -> Result<()> {
    if TITLE_PATTERN.is_match(title) {
        Ok(())
    } else {
        Err(ApkdError::ValidationError(format!(
            "title '{title}' may only contain letters, digits, '_' and '-'"
        )))
    }
}

impl Add {
    pub async fn run(&self, ctx: &AppContext) -> Result<()> {
        validate_title(&self.title)?;
        if let Some(url) = &self.direct {
            validate_url(url)?;
        }

        let repo = ctx.catalog();
        let existing = match repo.load().await {
            Ok(catalog) => catalog,
            Err(ApkdError::CatalogUnreadable(..)) if !repo.path().exists() => Catalog::default(),
            Err(e) => return Err(e),
        };
        if existing.position_by_title(&self.title).is_some() {
            return Err(ApkdError::ValidationError(format!(
                "an app titled '{}' already exists",
                self.title
            )));
        }

        let filename = format!("{}.apk", self.title);
        let store = ctx.store();
        let staged = StagedArtifact::from_local(self.file.clone()).await?;

        let _lock = ctx.state.lock_updates().await;
        let version = store.extract_version(&staged).await;
        store.promote(&staged, &filename).await?;

        let record = AppRecord {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            download_url: ctx.config.public_download_url(&filename),
            source_update: self.direct.clone(),
            source_method: Some(match self.direct {
                Some(_) => SourceMethod::Direct.to_string(),
                None => "manual".to_string(),
            }),
            version: Some(version.clone()),
            last_updated: Some(timestamp_now()),
            ..Default::default()
        };
        repo.append(record).await?;
        info!("Registered '{}' as {}", self.title, filename);
        ctx.notifier.send(Notification::Added {
            title: self.title.clone(),
            version: version.clone(),
        });

        println!(
            "{} Added {} (version {}) at {}",
            "✓".green(),
            self.title.bold(),
            version,
            ctx.config.public_download_url(&filename)
        );
        Ok(())
    }
}
