use apkd_common::error::Result;
use apkd_common::AppRecord;
use clap::Args;
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};

use crate::context::AppContext;

#[derive(Args, Debug)]
pub struct List {
    /// Only show entries the scheduler updates automatically
    #[arg(long)]
    pub automatic: bool,
}

fn method_label(app: &AppRecord) -> String {
    match app.source() {
        None => "manual".to_string(),
        Some(Ok(descriptor)) => descriptor.method.to_string(),
        Some(Err(_)) => format!("{}?", app.source_method.as_deref().unwrap_or_default()),
    }
}

impl List {
    pub async fn run(&self, ctx: &AppContext) -> Result<()> {
        let catalog = ctx.catalog().load().await?;
        let apps: Vec<&AppRecord> = catalog
            .apps
            .iter()
            .filter(|app| !self.automatic || app.source().is_some())
            .collect();
        if apps.is_empty() {
            println!("{}", "0 apps in catalog".yellow());
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Title").style_spec("b"),
            Cell::new("Version").style_spec("b"),
            Cell::new("Method").style_spec("b"),
            Cell::new("Last updated").style_spec("b"),
            Cell::new("File").style_spec("b"),
        ]));
        for app in &apps {
            let filename = app
                .canonical_filename()
                .unwrap_or_else(|_| "(invalid)".to_string());
            table.add_row(Row::new(vec![
                Cell::new(&app.title).style_spec("Fb"),
                Cell::new(app.version_or_unknown()),
                Cell::new(&method_label(app)),
                Cell::new(app.last_updated.as_deref().unwrap_or("-")),
                Cell::new(&filename),
            ]));
        }
        table.printstd();
        println!("{}", format!("{} apps", apps.len()).bold());
        Ok(())
    }
}
