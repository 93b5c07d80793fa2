//! Binder CLI - notes and files in nested folders from the terminal
//!
//! Each invocation opens the workspace, restores the folder it was left in,
//! runs one command and saves the position again.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::{run_mkdir, run_note, run_upload};
use crate::commands::common::Session;
use crate::commands::delete::run_rm;
use crate::commands::edit::{run_edit, run_rename};
use crate::commands::export::run_export;
use crate::commands::list::{run_ls, run_pwd};
use crate::commands::mode::run_mode;
use crate::commands::navigate::run_cd;
use crate::commands::view::{run_cat, run_get};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "binder=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut session = Session::open(cli.data_dir, cli.user.as_deref()).await?;

    let result = execute(&mut session, cli.command).await;
    if let Err(error) = session.save_cursor().await {
        tracing::warn!("Could not save current folder: {error}");
    }
    result
}

async fn execute(session: &mut Session, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Ls { json } => run_ls(session, json),
        Commands::Pwd => run_pwd(session),
        Commands::Cd { target } => run_cd(session, &target).await,
        Commands::Mkdir { name } => run_mkdir(session, &name).await,
        Commands::Note { name, text } => run_note(session, &name, &text).await,
        Commands::Edit { target, text } => run_edit(session, &target, &text).await,
        Commands::Upload { paths } => run_upload(session, &paths).await,
        Commands::Rename { target, name } => run_rename(session, &target, &name).await,
        Commands::Rm { target } => run_rm(session, &target).await,
        Commands::Cat { target } => run_cat(session, &target).await,
        Commands::Get { target, output } => run_get(session, &target, output.as_deref()).await,
        Commands::Export { target, output } => {
            run_export(session, &target, output.as_deref()).await
        }
        Commands::Mode { mode } => run_mode(session, mode).await,
    }
}
