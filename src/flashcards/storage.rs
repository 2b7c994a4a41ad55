//! Review state store
//!
//! Owns the `card id -> record` map. The map is authoritative once loaded;
//! every mutation rewrites the whole snapshot through a [`StateBackend`].
//! Persistence problems never abort an operation: the in-memory change is
//! kept, the failure is logged and queued as a [`StoreWarning`].

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::algorithm::{Outcome, Scheduler};
use super::backend::{BackendError, StateBackend};
use super::models::*;
use super::persist::{decode_records, encode_records, PersistError, SkippedRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Persist error: {0}")]
    Persist(#[from] PersistError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Non-fatal problems reported to the caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreWarning {
    #[error("Failed to load review state: {0}")]
    LoadFailed(String),

    #[error("Skipped corrupt record {0}")]
    SkippedRecord(SkippedRecord),

    #[error("Failed to save review state: {0}")]
    PersistFailed(String),

    #[error("Ignored update for unknown card: {0}")]
    UnknownCard(String),

    #[error("Ignored update for deleted card: {0}")]
    DeletedCard(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct StoreConfig {
    /// Write the snapshot after every mutation
    pub autosave: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { autosave: true }
    }
}

/// Store for card review state
pub struct ReviewStateStore<B: StateBackend> {
    backend: B,
    config: StoreConfig,
    bounds: MemoryBounds,
    records: HashMap<String, StoredCardRecord>,
    dirty: bool,
    warnings: Vec<StoreWarning>,
}

impl<B: StateBackend> ReviewStateStore<B> {
    /// Load the store from `backend`.
    ///
    /// Unreadable or corrupt state is reported through [`Self::take_warnings`]
    /// and the store starts with whatever could be recovered.
    pub fn open(backend: B, config: StoreConfig, bounds: MemoryBounds) -> Self {
        let mut store = Self {
            backend,
            config,
            bounds,
            records: HashMap::new(),
            dirty: false,
            warnings: Vec::new(),
        };
        store.load();
        store
    }

    fn load(&mut self) {
        let text = match self.backend.read() {
            Ok(Some(text)) => text,
            Ok(None) => {
                log::debug!("No review state at {}, starting empty", self.backend.describe());
                return;
            }
            Err(e) => {
                log::warn!("Failed to read review state from {}: {}", self.backend.describe(), e);
                self.warnings.push(StoreWarning::LoadFailed(e.to_string()));
                return;
            }
        };

        let decoded = match decode_records(&text) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Review state at {} is unreadable: {}", self.backend.describe(), e);
                self.warnings.push(StoreWarning::LoadFailed(e.to_string()));
                return;
            }
        };

        for skipped in decoded.skipped {
            log::warn!("Skipping corrupt review record {}", skipped);
            self.warnings.push(StoreWarning::SkippedRecord(skipped));
        }

        self.records = decoded
            .records
            .into_iter()
            .map(|record| (record.card_id.clone(), record))
            .collect();

        log::info!(
            "Loaded {} review records from {}",
            self.records.len(),
            self.backend.describe()
        );
    }

    // ==================== State Operations ====================

    /// Get the state for a card, creating or restoring its record as needed
    pub fn get_or_create(&mut self, card_id: &str, now: DateTime<Utc>) -> MemoryState {
        if let Some(record) = self.records.get_mut(card_id) {
            if !record.deleted {
                return record.memory_state.clone();
            }

            record.deleted = false;
            let state = record.memory_state.clone();
            log::debug!("Restored deleted card {}", card_id);
            self.mark_changed();
            return state;
        }

        let record = StoredCardRecord::new(card_id.to_string(), now);
        let state = record.memory_state.clone();
        self.records.insert(card_id.to_string(), record);
        log::debug!("Created review record for card {}", card_id);
        self.mark_changed();
        state
    }

    /// Replace the state of a card after a review.
    ///
    /// Returns false (and changes nothing) if the card is unknown or deleted.
    pub fn update(&mut self, card_id: &str, new_state: MemoryState, now: DateTime<Utc>) -> bool {
        let bounds = self.bounds;
        match self.records.get_mut(card_id) {
            Some(record) if !record.deleted => {
                let mut state = new_state.clamped(&bounds);
                state.last_reviewed_at.get_or_insert(now);
                record.memory_state = state;
                record.last_review_date = Some(now);
            }
            Some(_) => {
                log::warn!("Ignoring review update for deleted card {}", card_id);
                self.warnings.push(StoreWarning::DeletedCard(card_id.to_string()));
                return false;
            }
            None => {
                log::warn!("Ignoring review update for unknown card {}", card_id);
                self.warnings.push(StoreWarning::UnknownCard(card_id.to_string()));
                return false;
            }
        }

        self.mark_changed();
        true
    }

    /// Soft-delete a card. Unknown ids and repeated calls are no-ops.
    pub fn mark_deleted(&mut self, card_id: &str) {
        match self.records.get_mut(card_id) {
            Some(record) if !record.deleted => {
                record.deleted = true;
                log::debug!("Marked card {} deleted", card_id);
                self.mark_changed();
            }
            Some(_) => {}
            None => log::debug!("Delete of unknown card {} ignored", card_id),
        }
    }

    pub fn is_deleted(&self, card_id: &str) -> bool {
        self.records.get(card_id).map_or(false, |r| r.deleted)
    }

    pub fn get(&self, card_id: &str) -> Option<&StoredCardRecord> {
        self.records.get(card_id)
    }

    /// All records, including deleted ones, in no particular order
    pub fn records(&self) -> impl Iterator<Item = &StoredCardRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ==================== Review Operations ====================

    /// Ids of all non-deleted cards due at `now`
    pub fn get_due_card_ids(&self, now: DateTime<Utc>) -> HashSet<String> {
        self.records
            .values()
            .filter(|r| !r.deleted && r.memory_state.is_due(now))
            .map(|r| r.card_id.clone())
            .collect()
    }

    /// Due records ordered by due date (oldest first), then id
    pub fn due_cards_sorted(&self, now: DateTime<Utc>) -> Vec<&StoredCardRecord> {
        let mut due: Vec<&StoredCardRecord> = self
            .records
            .values()
            .filter(|r| !r.deleted && r.memory_state.is_due(now))
            .collect();
        due.sort_by(|a, b| {
            a.memory_state
                .due_at
                .cmp(&b.memory_state.due_at)
                .then_with(|| a.card_id.cmp(&b.card_id))
        });
        due
    }

    /// Rate a card and store the matching outcome
    pub fn review(
        &mut self,
        card_id: &str,
        rating: Rating,
        scheduler: &Scheduler,
        now: DateTime<Utc>,
    ) -> Outcome {
        let state = self.get_or_create(card_id, now);
        let outcome = scheduler.schedule(&state, now).into_outcome(rating);
        self.update(card_id, outcome.next_state.clone(), now);
        outcome
    }

    /// Get review statistics over all records
    pub fn stats(&self, now: DateTime<Utc>) -> ReviewStats {
        let mut stats = ReviewStats::default();

        for record in self.records.values() {
            if record.deleted {
                stats.deleted_cards += 1;
                continue;
            }

            stats.total_cards += 1;
            match record.memory_state.phase {
                CardPhase::New => stats.new_cards += 1,
                CardPhase::Learning => stats.learning_cards += 1,
                CardPhase::Review => stats.review_cards += 1,
                CardPhase::Relearning => stats.relearning_cards += 1,
            }

            if record.memory_state.is_due(now) {
                stats.due_cards += 1;
            }
        }

        stats
    }

    // ==================== Persistence ====================

    /// Write the full snapshot now
    pub fn flush(&mut self) -> Result<()> {
        let text = encode_records(self.records.values())?;
        self.backend.write(&text)?;
        self.dirty = false;
        Ok(())
    }

    /// Whether in-memory changes have not reached the backend yet
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Drain warnings collected since the last call
    pub fn take_warnings(&mut self) -> Vec<StoreWarning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn mark_changed(&mut self) {
        self.dirty = true;
        if !self.config.autosave {
            return;
        }

        if let Err(e) = self.flush() {
            log::warn!(
                "Failed to save review state to {}: {}",
                self.backend.describe(),
                e
            );
            self.warnings.push(StoreWarning::PersistFailed(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::backend::{JsonFileBackend, MemoryBackend};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap()
    }

    fn open(backend: &MemoryBackend) -> ReviewStateStore<&MemoryBackend> {
        ReviewStateStore::open(backend, StoreConfig::default(), MemoryBounds::default())
    }

    fn state_map<B: StateBackend>(store: &ReviewStateStore<B>) -> HashMap<String, MemoryState> {
        store
            .records()
            .map(|r| (r.card_id.clone(), r.memory_state.clone()))
            .collect()
    }

    #[test]
    fn test_get_or_create_new_card() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend);

        let state = store.get_or_create("abc", t0());
        assert_eq!(state.phase, CardPhase::New);
        assert!(state.due_at <= t0());
        assert!(!store.is_deleted("abc"));
        assert!(backend.contents().unwrap().contains("\"abc\""));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_get_or_create_existing_does_not_write() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend);
        let first = store.get_or_create("abc", t0());

        backend.set_fail_writes(true);
        let second = store.get_or_create("abc", t0() + Duration::hours(1));
        assert_eq!(first, second);
        assert!(store.take_warnings().is_empty());
    }

    #[test]
    fn test_new_card_scenario_rated_good() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend);
        let scheduler = Scheduler::default();

        let outcome = store.review("abc", Rating::Good, &scheduler, t0());
        assert_eq!(outcome.next_state.due_at, t0() + Duration::minutes(10));

        let record = store.get("abc").unwrap();
        assert_eq!(record.memory_state.phase, CardPhase::Learning);
        assert_eq!(record.last_review_date, Some(t0()));
        assert!(store.get_due_card_ids(t0()).is_empty());
        assert!(store
            .get_due_card_ids(t0() + Duration::minutes(10))
            .contains("abc"));
    }

    #[test]
    fn test_round_trip_through_backend() {
        let backend = MemoryBackend::new();
        let scheduler = Scheduler::default();
        let expected = {
            let mut store = open(&backend);
            let mut now = t0();
            for (i, rating) in [Rating::Good, Rating::Easy, Rating::Again, Rating::Hard]
                .into_iter()
                .enumerate()
            {
                store.review(&format!("card-{}", i), rating, &scheduler, now);
                store.review("shared", rating, &scheduler, now);
                now += Duration::days(2);
            }
            store.mark_deleted("card-1");
            state_map(&store)
        };

        let mut reloaded = open(&backend);
        assert!(reloaded.take_warnings().is_empty());
        assert_eq!(state_map(&reloaded), expected);
        assert!(reloaded.is_deleted("card-1"));
        assert!(!reloaded.is_deleted("card-0"));
    }

    #[test]
    fn test_restore_preserves_history() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend);
        let scheduler = Scheduler::default();

        store.review("x", Rating::Easy, &scheduler, t0());
        let before = store.get("x").unwrap().memory_state.clone();

        store.mark_deleted("x");
        store.mark_deleted("x");
        assert!(store.is_deleted("x"));
        let far_future = t0() + Duration::days(1000);
        assert!(!store.get_due_card_ids(far_future).contains("x"));

        let restored = store.get_or_create("x", far_future);
        assert_eq!(restored, before);
        assert!(!store.is_deleted("x"));
        assert!(store.get_due_card_ids(far_future).contains("x"));
    }

    #[test]
    fn test_mark_deleted_unknown_is_noop() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend);

        store.mark_deleted("x");
        assert!(store.is_empty());
        assert!(!store.is_deleted("x"));
        assert!(!store.get_due_card_ids(t0()).contains("x"));
        assert!(backend.contents().is_none());
        assert!(store.take_warnings().is_empty());
    }

    #[test]
    fn test_update_unknown_or_deleted_is_ignored() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend);

        assert!(!store.update("ghost", MemoryState::new_card(t0()), t0()));
        assert!(store.get("ghost").is_none());

        store.get_or_create("gone", t0());
        store.mark_deleted("gone");
        let mut state = MemoryState::new_card(t0());
        state.phase = CardPhase::Review;
        assert!(!store.update("gone", state, t0()));
        assert_eq!(store.get("gone").unwrap().memory_state.phase, CardPhase::New);

        let warnings = store.take_warnings();
        assert_eq!(
            warnings,
            vec![
                StoreWarning::UnknownCard("ghost".to_string()),
                StoreWarning::DeletedCard("gone".to_string()),
            ]
        );
    }

    #[test]
    fn test_update_clamps_into_bounds() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend);
        store.get_or_create("c", t0());

        let mut state = MemoryState::new_card(t0());
        state.phase = CardPhase::Review;
        state.review_count = 2;
        state.stability = -1.0;
        state.difficulty = 14.0;
        assert!(store.update("c", state, t0()));

        let stored = &store.get("c").unwrap().memory_state;
        assert_eq!(stored.stability, 0.01);
        assert_eq!(stored.difficulty, 10.0);
        assert_eq!(stored.last_reviewed_at, Some(t0()));
    }

    #[test]
    fn test_due_ids_and_sorting() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend);
        let scheduler = Scheduler::default();

        store.get_or_create("late", t0());
        store.get_or_create("early", t0() - Duration::hours(2));
        store.get_or_create("deleted", t0() - Duration::hours(5));
        store.mark_deleted("deleted");
        store.review("reviewed", Rating::Easy, &scheduler, t0());

        let due = store.get_due_card_ids(t0());
        assert_eq!(due.len(), 2);
        assert!(due.contains("late") && due.contains("early"));

        let sorted: Vec<&str> = store
            .due_cards_sorted(t0())
            .iter()
            .map(|r| r.card_id.as_str())
            .collect();
        assert_eq!(sorted, vec!["early", "late"]);
    }

    #[test]
    fn test_corrupt_records_skipped_on_load() {
        let backend = MemoryBackend::with_contents(
            r#"[
                {"cardId": "ok", "fsrsCard": {"due": "2024-06-01T00:00:00Z", "stability": 0,
                  "difficulty": 0, "elapsed_days": 0, "scheduled_days": 0, "reps": 0,
                  "lapses": 0, "state": 0}},
                {"cardId": "broken", "fsrsCard": {"due": "not a date"}}
            ]"#,
        );
        let mut store = open(&backend);

        assert_eq!(store.len(), 1);
        assert!(store.get("ok").is_some());
        let warnings = store.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            StoreWarning::SkippedRecord(s) if s.card_id.as_deref() == Some("broken")
        ));
    }

    #[test]
    fn test_unreadable_file_starts_empty() {
        let backend = MemoryBackend::with_contents("{ this is not json");
        let mut store = open(&backend);

        assert!(store.is_empty());
        assert!(matches!(
            store.take_warnings().as_slice(),
            [StoreWarning::LoadFailed(_)]
        ));

        store.get_or_create("fresh", t0());
        assert!(backend.contents().unwrap().contains("fresh"));
    }

    #[test]
    fn test_persist_failure_keeps_memory_state() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend);
        let scheduler = Scheduler::default();
        store.get_or_create("p", t0());

        backend.set_fail_writes(true);
        let outcome = store.review("p", Rating::Good, &scheduler, t0());
        assert_eq!(store.get("p").unwrap().memory_state, outcome.next_state);
        assert!(store.is_dirty());
        assert!(matches!(
            store.take_warnings().as_slice(),
            [StoreWarning::PersistFailed(_)]
        ));

        backend.set_fail_writes(false);
        store.flush().unwrap();
        assert!(!store.is_dirty());

        let reloaded = open(&backend);
        assert_eq!(reloaded.get("p").unwrap().memory_state, outcome.next_state);
    }

    #[test]
    fn test_deferred_persistence() {
        let backend = MemoryBackend::new();
        let config = StoreConfig { autosave: false };
        let mut store = ReviewStateStore::open(&backend, config, MemoryBounds::default());

        store.get_or_create("d", t0());
        assert!(store.is_dirty());
        assert!(backend.contents().is_none());

        store.flush().unwrap();
        assert!(backend.contents().unwrap().contains("\"d\""));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_stats() {
        let backend = MemoryBackend::new();
        let mut store = open(&backend);
        let scheduler = Scheduler::default();

        store.get_or_create("new", t0());
        store.review("learning", Rating::Good, &scheduler, t0());
        store.review("review", Rating::Easy, &scheduler, t0());
        store.get_or_create("deleted", t0());
        store.mark_deleted("deleted");

        let stats = store.stats(t0());
        assert_eq!(stats.total_cards, 3);
        assert_eq!(stats.new_cards, 1);
        assert_eq!(stats.learning_cards, 1);
        assert_eq!(stats.review_cards, 1);
        assert_eq!(stats.relearning_cards, 0);
        assert_eq!(stats.due_cards, 1);
        assert_eq!(stats.deleted_cards, 1);
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("review-state.json");
        let scheduler = Scheduler::default();

        let expected = {
            let mut store = ReviewStateStore::open(
                JsonFileBackend::new(path.clone()),
                StoreConfig::default(),
                MemoryBounds::default(),
            );
            store.review("file-card", Rating::Hard, &scheduler, t0());
            store.get("file-card").unwrap().clone()
        };

        let store = ReviewStateStore::open(
            JsonFileBackend::new(path),
            StoreConfig::default(),
            MemoryBounds::default(),
        );
        assert_eq!(store.get("file-card"), Some(&expected));
    }
}
