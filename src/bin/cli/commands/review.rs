use anyhow::{Context, Result};

use mnemo_lib::flashcards::{format_interval, Rating};

use super::record_json;
use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &mut App, id: &str, rating: &str, format: &OutputFormat) -> Result<()> {
    let rating: Rating = rating.parse().context("Invalid rating")?;
    let now = app.now;
    let outcome = app.store.review(id, rating, &app.scheduler, now);
    let record = app.find_card(id)?;

    match format {
        OutputFormat::Json => {
            let mut output = record_json(record);
            output["rating"] = serde_json::json!(rating.as_str());
            output["intervalDays"] = serde_json::json!(outcome.interval_days);
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!(
                "Rated {} as {}: next review in {} ({})",
                id,
                rating,
                format_interval(outcome.interval_days),
                outcome.next_state.phase
            );
        }
    }

    Ok(())
}
