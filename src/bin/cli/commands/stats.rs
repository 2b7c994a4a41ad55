use anyhow::Result;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat) -> Result<()> {
    let stats = app.store.stats(app.now);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Plain => {
            println!("Cards:      {}", stats.total_cards);
            println!("  New:        {}", stats.new_cards);
            println!("  Learning:   {}", stats.learning_cards);
            println!("  Review:     {}", stats.review_cards);
            println!("  Relearning: {}", stats.relearning_cards);
            println!("Due now:    {}", stats.due_cards);
            println!("Deleted:    {}", stats.deleted_cards);
        }
    }

    Ok(())
}
