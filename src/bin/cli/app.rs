use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use mnemo_lib::flashcards::StoredCardRecord;
use mnemo_lib::{open_review_state, AppConfig, FileReviewStore, Scheduler};

/// Shared application state for CLI commands
pub struct App {
    pub store: FileReviewStore,
    pub scheduler: Scheduler,
    /// Time all commands treat as "now"
    pub now: DateTime<Utc>,
}

impl App {
    pub fn new(
        config_path: Option<&Path>,
        state_file: Option<PathBuf>,
        now: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => AppConfig::default_config_path().context("Failed to get data directory")?,
        };

        let mut config = AppConfig::load(&config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?;
        if state_file.is_some() {
            config.state_file = state_file;
        }

        let (store, scheduler) =
            open_review_state(&config).context("Failed to open review state")?;

        Ok(Self {
            store,
            scheduler,
            now: now.unwrap_or_else(Utc::now),
        })
    }

    /// Find a card record, including deleted ones
    pub fn find_card(&self, id: &str) -> Result<&StoredCardRecord> {
        match self.store.get(id) {
            Some(record) => Ok(record),
            None => bail!("No card with id '{}'", id),
        }
    }

    /// Print store warnings (corrupt records, failed saves) to stderr
    pub fn report_warnings(&mut self) {
        for warning in self.store.take_warnings() {
            eprintln!("warning: {}", warning);
        }
    }
}
