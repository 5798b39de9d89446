//! Record commands: list, show, delete.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use serde_json::Value;

use commune_types::collection::Collection;
use commune_types::document::Document;
use commune_types::identity::{self, PartialId};

use crate::state::AppState;

const SUMMARY_WIDTH: usize = 60;

/// Compact one-line rendering of a record's data, cut at `width` characters.
fn summarize(data: &Value, width: usize) -> String {
    let text = data.to_string();
    if text.chars().count() <= width {
        return text;
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn reference_text(document: &Document) -> String {
    document
        .reference()
        .map(|r| r.as_str().to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Record as JSON with its identifiers alongside the data.
fn document_json(document: &Document) -> Result<Value> {
    Ok(serde_json::json!({
        "collection": document.collection(),
        "partialId": document.partial_id()?.as_str(),
        "reference": document.reference().map(|r| r.as_str()),
        "data": document.to_data()?,
    }))
}

async fn find(state: &AppState, collection: Collection, partial_id: &str) -> Result<(PartialId, Document)> {
    let partial_id = identity::validate(partial_id, collection)?;
    match state.store.fetch_document(collection, &partial_id).await {
        Some(document) => Ok((partial_id, document)),
        None => bail!("no {collection} record with id '{}'", partial_id.as_str()),
    }
}

pub async fn list_documents(state: &AppState, collection: Collection, json: bool) -> Result<()> {
    let documents = state.store.get_all_documents(collection).await;

    if json {
        let entries = documents.iter().map(document_json).collect::<Result<Vec<_>>>()?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if documents.is_empty() {
        println!();
        println!("  No {} records.", style(collection).bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Partial ID").fg(Color::Cyan),
            Cell::new("Reference").fg(Color::Cyan),
            Cell::new("Data").fg(Color::Cyan),
        ]);

    for document in &documents {
        table.add_row(vec![
            Cell::new(document.partial_id()?.as_str()),
            Cell::new(reference_text(document)).fg(Color::DarkGrey),
            Cell::new(summarize(&document.to_data()?, SUMMARY_WIDTH)),
        ]);
    }

    println!();
    println!("{table}");
    println!(
        "  {} {} record(s)",
        style(documents.len()).bold(),
        style(collection).cyan()
    );
    println!();
    Ok(())
}

pub async fn show_document(
    state: &AppState,
    collection: Collection,
    partial_id: &str,
    json: bool,
) -> Result<()> {
    let (partial_id, document) = find(state, collection, partial_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&document_json(&document)?)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(collection).cyan().bold(),
        style(partial_id.as_str()).bold()
    );
    println!("  {} {}", style("Reference:").dim(), reference_text(&document));
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Field").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    if let Value::Object(fields) = document.to_data()? {
        for (name, value) in &fields {
            table.add_row(vec![Cell::new(name), Cell::new(field_text(value))]);
        }
    }

    println!("{table}");
    println!();
    Ok(())
}

pub async fn delete_document(
    state: &AppState,
    collection: Collection,
    partial_id: &str,
    force: bool,
    json: bool,
) -> Result<()> {
    let (partial_id, document) = find(state, collection, partial_id).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete {} record '{}'?",
                collection,
                style(partial_id.as_str()).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let spinner = super::spinner("red", format!("Deleting {}...", partial_id.as_str()))?;
    let outcome = state.store.delete_document(&document).await;
    spinner.finish_and_clear();
    outcome?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "deleted": true,
                "collection": collection,
                "partialId": partial_id.as_str(),
            })
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} Deleted {} record {}",
        style("✓").green().bold(),
        collection,
        style(partial_id.as_str()).bold()
    );
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use commune_types::model::Model;
    use commune_types::records::User;
    use serde_json::json;

    #[test]
    fn test_summarize_keeps_short_values() {
        assert_eq!(summarize(&json!({"a": 1}), 60), r#"{"a":1}"#);
    }

    #[test]
    fn test_summarize_cuts_long_values() {
        let data = json!({"comment": "x".repeat(100)});
        let summary = summarize(&data, 20);
        assert_eq!(summary.chars().count(), 20);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_summarize_is_char_safe() {
        let data = json!({"name": "é".repeat(40)});
        let summary = summarize(&data, 10);
        assert_eq!(summary.chars().count(), 10);
    }

    #[test]
    fn test_field_text() {
        assert_eq!(field_text(&json!("plain")), "plain");
        assert_eq!(field_text(&Value::Null), "-");
        assert_eq!(field_text(&json!(3)), "3");
    }

    #[test]
    fn test_document_json_carries_identifiers() {
        let document = User::new("42").into_document();
        let value = document_json(&document).unwrap();
        assert_eq!(value["collection"], "users");
        assert_eq!(value["partialId"], "42");
        assert_eq!(value["reference"], Value::Null);
        assert_eq!(value["data"]["userId"], "42");
    }
}
