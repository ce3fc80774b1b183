use apkd_common::error::{ApkdError, Result};
use clap::Args;
use colored::Colorize;

use crate::context::AppContext;

#[derive(Args, Debug)]
pub struct Resolve {
    /// Catalog title (case-insensitive)
    pub title: String,
}

impl Resolve {
    pub async fn run(&self, ctx: &AppContext) -> Result<()> {
        let catalog = ctx.catalog().load().await?;
        let matches: Vec<_> = catalog
            .apps
            .iter()
            .filter(|app| app.title.eq_ignore_ascii_case(&self.title))
            .collect();
        let app = match matches.as_slice() {
            [app] => *app,
            [] => return Err(ApkdError::NoMatch),
            several => return Err(ApkdError::AmbiguousMatch(several.len())),
        };

        let descriptor = app.source().ok_or_else(|| {
            ApkdError::ValidationError(format!("'{}' has no automatic source", app.title))
        })??;
        println!(
            "{} {} source: {}",
            "==>".bold().blue(),
            descriptor.method,
            descriptor.locator
        );
        let url = ctx.reconciler.resolver().resolve(&descriptor).await?;
        println!("{url}");
        Ok(())
    }
}
