use anyhow::Result;

use super::{format_due, record_json};
use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, limit: Option<usize>, format: &OutputFormat) -> Result<()> {
    let mut due = app.store.due_cards_sorted(app.now);
    if let Some(limit) = limit {
        due.truncate(limit);
    }

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = due.iter().map(|r| record_json(r)).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if due.is_empty() {
                println!("No cards due.");
                return Ok(());
            }

            let id_width = due.iter().map(|r| r.card_id.len()).max().unwrap_or(2).clamp(2, 40);
            let phase_width = 10;

            println!("{:<iw$} {:<pw$} {}", "ID", "Phase", "Due", iw = id_width, pw = phase_width);
            println!("{} {} {}",
                "\u{2500}".repeat(id_width),
                "\u{2500}".repeat(phase_width),
                "\u{2500}".repeat(16));

            for record in &due {
                println!("{:<iw$} {:<pw$} {}",
                    record.card_id,
                    record.memory_state.phase.as_str(),
                    format_due(record.memory_state.due_at, app.now),
                    iw = id_width, pw = phase_width);
            }

            println!("\n{} card(s) due", due.len());
        }
    }

    Ok(())
}
