//! CLI command definitions using clap derive.
//!
//! `commune [--json] [-v] <command>` inspects and edits the records held by
//! the configured storage backend.

pub mod document;
pub mod seed;
pub mod status;

use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use clap_complete::Shell;
use commune_types::collection::Collection;

/// Commune storage - inspect community records.
#[derive(Parser)]
#[command(name = "commune", version, about, long_about = None)]
pub struct Cli {
    /// Output as JSON instead of human-readable format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the active adapter and cache contents.
    Status,

    /// List every record in a collection.
    List {
        /// Collection name (e.g. resources, entry-requests).
        collection: Collection,
    },

    /// Show one record.
    Show {
        collection: Collection,

        /// Partial identifier, parts joined by '/'.
        partial_id: String,
    },

    /// Delete one record.
    Delete {
        collection: Collection,

        partial_id: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Store a new resource link.
    SeedResource {
        guild_id: String,
        author_id: String,
        url: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Steady-ticking spinner shown while a backend call is in flight.
pub(crate) fn spinner(color: &str, message: String) -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template(&format!("{{spinner:.{color}}} {{msg}}"))?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}
