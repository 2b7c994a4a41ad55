use anyhow::Result;

use super::record_json;
use crate::app::App;
use crate::OutputFormat;

pub fn run_delete(app: &mut App, id: &str, format: &OutputFormat) -> Result<()> {
    app.store.mark_deleted(id);

    match format {
        OutputFormat::Json => {
            let output = match app.store.get(id) {
                Some(record) => record_json(record),
                None => serde_json::json!({ "cardId": id, "deleted": false, "known": false }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if app.store.is_deleted(id) {
                println!("Deleted card {} (history kept)", id);
            } else {
                println!("No card with id '{}', nothing to delete", id);
            }
        }
    }

    Ok(())
}

pub fn run_restore(app: &mut App, id: &str, format: &OutputFormat) -> Result<()> {
    let was_deleted = app.store.is_deleted(id);
    let now = app.now;
    let state = app.store.get_or_create(id, now);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&record_json(app.find_card(id)?))?);
        }
        OutputFormat::Plain => {
            if was_deleted {
                println!("Restored card {} ({}, {} reviews)", id, state.phase, state.review_count);
            } else {
                println!("Card {} is active ({})", id, state.phase);
            }
        }
    }

    Ok(())
}
