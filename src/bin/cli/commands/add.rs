use anyhow::{bail, Result};

use mnemo_lib::new_card_id;

use super::{format_due, record_json};
use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &mut App, id: Option<String>, format: &OutputFormat) -> Result<()> {
    let id = id.unwrap_or_else(new_card_id);
    if app.store.get(&id).map_or(false, |r| !r.deleted) {
        bail!("Card '{}' already exists", id);
    }

    let now = app.now;
    let state = app.store.get_or_create(&id, now);
    let record = app.find_card(&id)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&record_json(record))?);
        }
        OutputFormat::Plain => {
            println!("Added card {}", id);
            println!("  Phase: {}", state.phase);
            println!("  Due:   {}", format_due(state.due_at, now));
        }
    }

    Ok(())
}
