//! On-disk layout of the review state file
//!
//! The file is a JSON array with one entry per card:
//!
//! ```json
//! [
//!   {
//!     "cardId": "k2x9f0",
//!     "fsrsCard": {
//!       "due": "2024-05-10T09:30:00Z",
//!       "stability": 3.1262,
//!       "difficulty": 5.31,
//!       "elapsed_days": 0,
//!       "scheduled_days": 3,
//!       "reps": 2,
//!       "lapses": 0,
//!       "state": 2,
//!       "last_review": "2024-05-07T09:30:00Z"
//!     },
//!     "lastReviewDate": "2024-05-07T09:30:00Z",
//!     "deleted": false
//!   }
//! ]
//! ```
//!
//! Entries that fail to parse or validate are skipped individually.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::models::{CardPhase, MemoryState, StoredCardRecord};

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PersistError>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRecord {
    card_id: String,
    fsrs_card: PersistedCard,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_review_date: Option<DateTime<Utc>>,
    #[serde(default)]
    deleted: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCard {
    due: DateTime<Utc>,
    stability: f64,
    difficulty: f64,
    #[serde(deserialize_with = "lenient_count")]
    elapsed_days: u32,
    #[serde(deserialize_with = "lenient_count")]
    scheduled_days: u32,
    #[serde(deserialize_with = "lenient_count")]
    reps: u32,
    #[serde(deserialize_with = "lenient_count")]
    lapses: u32,
    #[serde(deserialize_with = "lenient_count")]
    state: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_review: Option<DateTime<Utc>>,
}

/// Accept any non-negative JSON number for integer counters
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() && value >= 0.0 && value <= u32::MAX as f64 {
        Ok(value.round() as u32)
    } else {
        Err(D::Error::custom(format!("invalid count {}", value)))
    }
}

impl From<&StoredCardRecord> for PersistedRecord {
    fn from(record: &StoredCardRecord) -> Self {
        let state = &record.memory_state;
        Self {
            card_id: record.card_id.clone(),
            fsrs_card: PersistedCard {
                due: state.due_at,
                stability: state.stability,
                difficulty: state.difficulty,
                elapsed_days: state.elapsed_days,
                scheduled_days: state.scheduled_days,
                reps: state.review_count,
                lapses: state.lapse_count,
                state: state.phase.as_ordinal() as u32,
                last_review: state.last_reviewed_at,
            },
            last_review_date: record.last_review_date,
            deleted: Some(record.deleted),
        }
    }
}

impl TryFrom<PersistedRecord> for StoredCardRecord {
    type Error = String;

    fn try_from(record: PersistedRecord) -> std::result::Result<Self, Self::Error> {
        let card = record.fsrs_card;

        if !card.stability.is_finite() || card.stability < 0.0 {
            return Err(format!("invalid stability {}", card.stability));
        }
        if !card.difficulty.is_finite() || card.difficulty < 0.0 {
            return Err(format!("invalid difficulty {}", card.difficulty));
        }
        let phase = u8::try_from(card.state)
            .ok()
            .and_then(CardPhase::from_ordinal)
            .ok_or_else(|| format!("unknown state ordinal {}", card.state))?;

        Ok(Self {
            card_id: record.card_id,
            memory_state: MemoryState {
                due_at: card.due,
                stability: card.stability,
                difficulty: card.difficulty,
                elapsed_days: card.elapsed_days,
                scheduled_days: card.scheduled_days,
                review_count: card.reps,
                lapse_count: card.lapses,
                last_reviewed_at: card.last_review,
                phase,
            },
            last_review_date: record.last_review_date,
            deleted: record.deleted.unwrap_or(false),
        })
    }
}

/// An entry that was dropped while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Position in the JSON array
    pub index: usize,
    pub card_id: Option<String>,
    pub reason: String,
}

impl fmt::Display for SkippedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.card_id {
            Some(id) => write!(f, "entry {} ({}): {}", self.index, id, self.reason),
            None => write!(f, "entry {}: {}", self.index, self.reason),
        }
    }
}

#[derive(Debug, Default)]
pub struct DecodedRecords {
    pub records: Vec<StoredCardRecord>,
    pub skipped: Vec<SkippedRecord>,
}

/// Parse a state file.
///
/// Fails only when the text is not a JSON array at all.
pub fn decode_records(text: &str) -> Result<DecodedRecords> {
    let mut decoded = DecodedRecords::default();
    if text.trim().is_empty() {
        return Ok(decoded);
    }

    let entries: Vec<serde_json::Value> = serde_json::from_str(text)?;
    let mut seen = HashSet::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let card_id = entry
            .get("cardId")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let parsed = serde_json::from_value::<PersistedRecord>(entry)
            .map_err(|e| e.to_string())
            .and_then(StoredCardRecord::try_from);

        match parsed {
            Ok(record) => {
                if !seen.insert(record.card_id.clone()) {
                    decoded.skipped.push(SkippedRecord {
                        index,
                        card_id,
                        reason: "duplicate cardId".to_string(),
                    });
                    continue;
                }
                decoded.records.push(record);
            }
            Err(reason) => decoded.skipped.push(SkippedRecord {
                index,
                card_id,
                reason,
            }),
        }
    }

    Ok(decoded)
}

/// Serialize records as a JSON array ordered by card id
pub fn encode_records<'a, I>(records: I) -> Result<String>
where
    I: IntoIterator<Item = &'a StoredCardRecord>,
{
    let mut persisted: Vec<PersistedRecord> =
        records.into_iter().map(PersistedRecord::from).collect();
    persisted.sort_by(|a, b| a.card_id.cmp(&b.card_id));
    Ok(serde_json::to_string_pretty(&persisted)?)
}
