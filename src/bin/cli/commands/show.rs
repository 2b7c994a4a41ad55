use anyhow::Result;

use super::{format_due, record_json};
use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, id: &str, format: &OutputFormat) -> Result<()> {
    let record = app.find_card(id)?;

    match format {
        OutputFormat::Json => {
            let mut output = record_json(record);
            output["retrievability"] =
                serde_json::json!(app.scheduler.retrievability(&record.memory_state, app.now));
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            let state = &record.memory_state;
            let deleted = if record.deleted { " [deleted]" } else { "" };
            println!("{}{}", record.card_id, deleted);
            println!("  Phase:          {}", state.phase);
            println!("  Due:            {}", format_due(state.due_at, app.now));
            println!("  Stability:      {:.2}", state.stability);
            println!("  Difficulty:     {:.2}", state.difficulty);
            println!("  Reviews:        {} ({} lapses)", state.review_count, state.lapse_count);
            println!(
                "  Retrievability: {:.1}%",
                app.scheduler.retrievability(state, app.now) * 100.0
            );
            match state.last_reviewed_at {
                Some(last) => println!("  Last review:    {}", last.format("%Y-%m-%d %H:%M")),
                None => println!("  Last review:    never"),
            }
        }
    }

    Ok(())
}
