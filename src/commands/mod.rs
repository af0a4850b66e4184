//! Command-line surface.
//!
//! Each subcommand handler returns the process exit code or a
//! [`RenameError`](crate::error::RenameError); fatal errors map to exit code 1.

pub mod key;
pub mod quarantine;
pub mod rename;
pub mod undo;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "sentinel-rename", version)]
#[command(about = "Rename files after what is inside them", long_about = None)]
pub struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rename every file in a directory from its content
    Rename(RenameArgs),
    /// Reverse the renames and duplicate removals of a logged run
    Undo(UndoArgs),
    /// Inspect or clean up removed duplicates
    Quarantine {
        #[command(subcommand)]
        action: QuarantineAction,
    },
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Directory whose files are renamed (not recursive)
    pub directory: PathBuf,

    /// Naming instruction; a built-in default is used when omitted
    #[arg(short, long)]
    pub instruction: Option<String>,

    /// Print the cost estimate and stop
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Never prompt; missing credentials are fatal
    #[arg(long, env = "SENTINEL_RENAME_NON_INTERACTIVE")]
    pub non_interactive: bool,

    /// Print the summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Model used for generation and pricing
    #[arg(long)]
    pub model: Option<String>,

    /// Number of previous renames shown to the model
    #[arg(long)]
    pub window: Option<usize>,

    /// Abort when the estimated cost exceeds this many USD
    #[arg(long, value_name = "USD")]
    pub max_cost: Option<f64>,

    /// Send duplicates to the OS trash instead of the quarantine
    #[arg(long)]
    pub trash: bool,

    /// Do not write the rename history log
    #[arg(long)]
    pub no_log: bool,

    /// Use the built-in price table without a network lookup
    #[arg(long)]
    pub offline_pricing: bool,
}

#[derive(Debug, Args)]
pub struct UndoArgs {
    /// Run id to undo; defaults to the most recent run in the log
    #[arg(long = "run", value_name = "RUN_ID")]
    pub run_id: Option<String>,

    /// History log to read instead of the configured one
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum QuarantineAction {
    /// List quarantined files, newest first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Permanently delete quarantined files past the retention period
    Purge {
        #[arg(long, value_name = "N")]
        older_than_days: Option<u32>,
    },
}

#[derive(Debug, Subcommand)]
pub enum KeyAction {
    /// Prompt for an API key and store it in the OS keychain
    Set,
    /// Remove the stored API key
    Clear,
    /// Report whether an API key is available
    Status,
}

/// Run the parsed command and turn its result into an exit code
pub async fn dispatch(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Commands::Rename(args) => rename::run_rename(args).await,
        Commands::Undo(args) => undo::run_undo(args),
        Commands::Quarantine { action } => quarantine::run_quarantine(action),
        Commands::Key { action } => key::run_key(action),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}
