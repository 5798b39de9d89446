//! `seed-resource`: store a resource link through the typed store API.

use anyhow::Result;
use console::style;

use commune_types::model::Model;
use commune_types::records::Resource;

use crate::state::AppState;

pub async fn seed_resource(
    state: &AppState,
    guild_id: String,
    author_id: String,
    url: String,
    json: bool,
) -> Result<()> {
    let spinner = super::spinner("cyan", "Storing resource...".to_string())?;
    let outcome = state.store.create(Resource::new(guild_id, author_id, url)).await;
    spinner.finish_and_clear();
    let resource = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resource)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Stored resource {}",
        style("✓").green().bold(),
        style(resource.partial_id()?.as_str()).bold()
    );
    println!("  {} {}", style("URL:").dim(), resource.url);
    if let Some(reference) = resource.reference() {
        println!("  {} {}", style("Reference:").dim(), reference.as_str());
    }
    println!();
    Ok(())
}
