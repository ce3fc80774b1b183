// apkd/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::sync::Arc;

use apkd_common::error::Result;
use clap::{ArgAction, Parser, Subcommand};

pub mod add;
pub mod intake;
pub mod list;
pub mod resolve;
pub mod serve;
pub mod update;

use crate::cli::add::Add;
use crate::cli::intake::Intake;
use crate::cli::list::List;
use crate::cli::resolve::Resolve;
use crate::cli::serve::Serve;
use crate::cli::update::Update;
use crate::context::AppContext;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "apkd", bin_name = "apkd")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scheduler and the Telegram bot until interrupted
    Serve(Serve),
    /// Run one update pass now
    Update(Update),
    /// Show the catalog
    List(List),
    /// Print the download URL an entry's source currently resolves to
    Resolve(Resolve),
    /// Publish a local APK for an existing catalog entry
    Intake(Intake),
    /// Register a new app from a local APK
    Add(Add),
}

impl Command {
    /// Long-running commands always log to file.
    pub fn is_service(&self) -> bool {
        matches!(self, Self::Serve(_))
    }

    pub async fn run(&self, ctx: Arc<AppContext>) -> Result<()> {
        match self {
            Self::Serve(command) => command.run(ctx).await,
            Self::Update(command) => command.run(&ctx).await,
            Self::List(command) => command.run(&ctx).await,
            Self::Resolve(command) => command.run(&ctx).await,
            Self::Intake(command) => command.run(&ctx).await,
            Self::Add(command) => command.run(&ctx).await,
        }
    }
}
