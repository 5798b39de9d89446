//! `status`: active adapter, configured backend and cache contents.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use commune_core::adapter::AdapterState;
use commune_core::store::CacheStats;
use commune_types::collection::Collection;

use crate::state::AppState;

fn state_label(state: AdapterState) -> &'static str {
    match state {
        AdapterState::Uninitialised => "uninitialised",
        AdapterState::Ready => "ready",
        AdapterState::Closed => "closed",
    }
}

fn styled_state(state: AdapterState) -> console::StyledObject<&'static str> {
    let label = style(state_label(state));
    match state {
        AdapterState::Uninitialised => label.yellow(),
        AdapterState::Ready => label.green(),
        AdapterState::Closed => label.red(),
    }
}

fn cache_table(stats: &CacheStats) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Collection").fg(Color::Cyan),
            Cell::new("Cached").fg(Color::Cyan),
        ]);
    for collection in Collection::ALL {
        let count = stats.count(collection);
        let cell = if count == 0 {
            Cell::new(count).fg(Color::DarkGrey)
        } else {
            Cell::new(count)
        };
        table.add_row(vec![Cell::new(collection), cell]);
    }
    table
}

pub async fn show_status(state: &AppState, json: bool) -> Result<()> {
    let adapter = state.store.adapter_name();
    let adapter_state = state.store.state();
    let configured = state.solution.map(|s| s.name());
    let stats = state.store.cache_stats();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "data_dir": state.data_dir.display().to_string(),
                "configured_solution": configured,
                "adapter": adapter,
                "state": state_label(adapter_state),
                "cache": stats,
            }))?
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} v{}",
        style("Commune").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("  {} {}", style("Data dir:").dim(), state.data_dir.display());
    println!(
        "  {} {}",
        style("Configured:").dim(),
        configured.unwrap_or("none")
    );
    println!(
        "  {} {} ({})",
        style("Adapter:").dim(),
        style(adapter).bold(),
        styled_state(adapter_state)
    );
    if configured.is_some_and(|name| name != adapter) {
        println!(
            "  {} configured backend unavailable, running on {}",
            style("!").yellow().bold(),
            adapter
        );
    }
    println!();
    println!("{}", cache_table(&stats));
    println!("  {} cached record(s)", style(stats.total()).bold());
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        assert_eq!(state_label(AdapterState::Ready), "ready");
        assert_eq!(state_label(AdapterState::Closed), "closed");
        assert_eq!(state_label(AdapterState::Uninitialised), "uninitialised");
    }

    #[test]
    fn test_cache_table_lists_every_collection() {
        let table = cache_table(&CacheStats::default());
        assert_eq!(table.row_iter().count(), Collection::ALL.len());
    }
}
