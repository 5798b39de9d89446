//! Commune storage CLI entry point.
//!
//! Binary name: `commune`
//!
//! Parses CLI arguments, sets up tracing, opens the configured store, then
//! dispatches to the command handler and tears the store down again.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use commune_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(TracingOptions::for_verbosity(cli.verbose, cli.quiet))
        .map_err(|e| anyhow::anyhow!("failed to initialise tracing: {e}"))?;

    // Shell completions don't need a store
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "commune", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let outcome = dispatch(&state, cli.command, cli.json).await;

    if let Err(e) = state.shutdown().await {
        tracing::warn!(error = %e, "storage teardown failed");
    }
    shutdown_tracing();
    outcome
}

async fn dispatch(state: &AppState, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Status => cli::status::show_status(state, json).await,
        Commands::List { collection } => {
            cli::document::list_documents(state, collection, json).await
        }
        Commands::Show {
            collection,
            partial_id,
        } => cli::document::show_document(state, collection, &partial_id, json).await,
        Commands::Delete {
            collection,
            partial_id,
            force,
        } => cli::document::delete_document(state, collection, &partial_id, force, json).await,
        Commands::SeedResource {
            guild_id,
            author_id,
            url,
        } => cli::seed::seed_resource(state, guild_id, author_id, url, json).await,
        // Handled before the store is opened.
        Commands::Completions { .. } => Ok(()),
    }
}
