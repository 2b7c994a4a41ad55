use anyhow::Result;

use mnemo_lib::flashcards::{format_interval, Rating};

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, id: &str, format: &OutputFormat) -> Result<()> {
    let record = app.find_card(id)?;
    let outcomes = app.scheduler.schedule(&record.memory_state, app.now);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
        OutputFormat::Plain => {
            println!("{:<6} {:<8} {:<11} {}", "Rating", "Interval", "Phase", "Due");
            for rating in Rating::ALL {
                let outcome = outcomes.get(rating);
                println!(
                    "{:<6} {:<8} {:<11} {}",
                    rating.as_str(),
                    format_interval(outcome.interval_days),
                    outcome.next_state.phase.as_str(),
                    outcome.next_state.due_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    Ok(())
}
