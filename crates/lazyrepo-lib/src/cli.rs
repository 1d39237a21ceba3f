use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, Subcommand};
use tracing::error;

use crate::commands;

#[derive(Parser, Clone, Debug)]
#[clap(author, about = "A caching task runner for multi-package workspaces", long_about = None)]
#[clap(disable_help_subcommand = true)]
#[clap(arg_required_else_help = true)]
#[command(name = "lazy", version)]
pub struct Args {
    /// Set the directory to run from, instead of the current directory
    #[clap(long, global = true, value_parser)]
    pub cwd: Option<Utf8PathBuf>,
    /// Raise log verbosity (-v, -vv)
    #[clap(short, long, global = true, action = ArgAction::Count)]
    pub verbosity: u8,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Run a task in every package it is defined for, skipping packages
    /// whose inputs have not changed since the last run
    Run {
        /// The task to run (a script name or a configured task)
        task: String,
        /// Only run the task in packages under these paths
        #[clap(long = "filter", value_name = "PATH")]
        filter: Vec<String>,
        /// Ignore the cache and run everything
        #[clap(long)]
        force: bool,
        /// Arguments appended to the task's command
        #[clap(last = true)]
        pass_through_args: Vec<String>,
    },
}

/// CLI entry point: parses arguments and dispatches. Returns the process
/// exit code.
pub async fn main() -> i32 {
    let args = Args::parse();
    crate::tracing::init_subscriber(args.verbosity);

    match commands::dispatch(args).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            eprintln!("lazy: {err}");
            1
        }
    }
}
