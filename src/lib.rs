//! Mnemo: spaced repetition review state for notes-embedded flashcards.
//!
//! Card parsing, review UI and file watching live with the host; this
//! crate owns the memory model, the scheduler and the state store.

pub mod config;
pub mod flashcards;

pub use config::{AppConfig, ConfigError};
pub use flashcards::{
    new_card_id, CardPhase, JsonFileBackend, MemoryState, Rating, ReviewStateStore, Scheduler,
    StoredCardRecord,
};

/// Store backed by the JSON state file
pub type FileReviewStore = ReviewStateStore<JsonFileBackend>;

/// Open the store and scheduler described by `config`
pub fn open_review_state(config: &AppConfig) -> Result<(FileReviewStore, Scheduler), ConfigError> {
    let scheduler = Scheduler::new(config.scheduler.clone())?;
    let state_file = config.resolve_state_file()?;
    let store = ReviewStateStore::open(
        JsonFileBackend::new(state_file),
        config.store.clone(),
        config.scheduler.bounds,
    );
    Ok((store, scheduler))
}
