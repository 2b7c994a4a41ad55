mod app;
mod commands;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mnemo-cli", about = "Inspect and drive flashcard review state", version)]
struct Cli {
    /// Configuration file (default: <data dir>/mnemo/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Review state file, overriding the configuration
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Treat this RFC 3339 timestamp as the current time
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Register a card (generates an id when none is given)
    Add {
        id: Option<String>,
    },

    /// List cards that are due for review
    Due {
        /// Maximum number of cards to list
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the stored state of a card
    Show {
        id: String,
    },

    /// Show the interval each rating would give a card
    Preview {
        id: String,
    },

    /// Rate a card and reschedule it
    Review {
        id: String,
        /// again, hard, good, easy (or 1-4)
        rating: String,
    },

    /// Mark a card as deleted, keeping its history
    Delete {
        id: String,
    },

    /// Bring back a deleted card with its history
    Restore {
        id: String,
    },

    /// Show review statistics
    Stats,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut app = app::App::new(cli.config.as_deref(), cli.state_file, cli.now)?;

    let result = match cli.command {
        Command::Add { id } => commands::add::run(&mut app, id, &cli.format),
        Command::Due { limit } => commands::due::run(&app, limit, &cli.format),
        Command::Show { id } => commands::show::run(&app, &id, &cli.format),
        Command::Preview { id } => commands::preview::run(&app, &id, &cli.format),
        Command::Review { id, rating } => {
            commands::review::run(&mut app, &id, &rating, &cli.format)
        }
        Command::Delete { id } => commands::delete::run_delete(&mut app, &id, &cli.format),
        Command::Restore { id } => commands::delete::run_restore(&mut app, &id, &cli.format),
        Command::Stats => commands::stats::run(&app, &cli.format),
    };

    app.report_warnings();
    result
}
