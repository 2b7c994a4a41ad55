//! Data models for the review state system

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::algorithm::SchedulerError;

/// Phase of a card in the spaced repetition system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardPhase {
    /// Never reviewed
    New,
    /// In initial learning phase
    Learning,
    /// Regular spaced review
    Review,
    /// Failed and re-learning
    Relearning,
}

impl Default for CardPhase {
    fn default() -> Self {
        Self::New
    }
}

impl CardPhase {
    /// Ordinal used by the persisted state file
    pub fn as_ordinal(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Learning => 1,
            Self::Review => 2,
            Self::Relearning => 3,
        }
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::New),
            1 => Some(Self::Learning),
            2 => Some(Self::Review),
            3 => Some(Self::Relearning),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
        }
    }
}

impl fmt::Display for CardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds every memory state is clamped into after a transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct MemoryBounds {
    pub min_difficulty: f64,
    pub max_difficulty: f64,
    /// Smallest stability an initialized card may have
    pub min_stability: f64,
}

impl Default for MemoryBounds {
    fn default() -> Self {
        Self {
            min_difficulty: 1.0,
            max_difficulty: 10.0,
            min_stability: 0.01,
        }
    }
}

/// Learner's current retention model for one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    /// When the card becomes eligible for review again
    pub due_at: DateTime<Utc>,
    /// Days until retrievability decays to the reference threshold.
    /// Zero means "not yet initialized" (new card).
    pub stability: f64,
    /// Zero for new cards, otherwise within the configured bounds
    pub difficulty: f64,
    /// Whole days between the previous review and the last one
    #[serde(default)]
    pub elapsed_days: u32,
    /// Whole-day interval chosen by the last transition (0 for learning steps)
    #[serde(default)]
    pub scheduled_days: u32,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub lapse_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub phase: CardPhase,
}

impl MemoryState {
    /// State of a brand-new card, immediately due
    pub fn new_card(now: DateTime<Utc>) -> Self {
        Self {
            due_at: now,
            stability: 0.0,
            difficulty: 0.0,
            elapsed_days: 0,
            scheduled_days: 0,
            review_count: 0,
            lapse_count: 0,
            last_reviewed_at: None,
            phase: CardPhase::New,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }

    /// Copy of this state with stability and difficulty forced into `bounds`.
    ///
    /// Uninitialized (New) states keep their zero sentinels.
    pub fn clamped(&self, bounds: &MemoryBounds) -> Self {
        let mut state = self.clone();
        if state.phase == CardPhase::New && state.review_count == 0 {
            state.stability = sanitize(state.stability, 0.0).max(0.0);
            state.difficulty = sanitize(state.difficulty, 0.0).max(0.0);
            return state;
        }

        state.stability = sanitize(state.stability, bounds.min_stability).max(bounds.min_stability);
        state.difficulty = sanitize(state.difficulty, bounds.max_difficulty)
            .clamp(bounds.min_difficulty, bounds.max_difficulty);
        state
    }
}

fn sanitize(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Mint a new card id. Ids are never reused once handed out.
pub fn new_card_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A card's memory state plus store bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCardRecord {
    pub card_id: String,
    pub memory_state: MemoryState,
    /// When the store last accepted a reviewed state for this card
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_review_date: Option<DateTime<Utc>>,
    /// Soft-delete flag; deleted records keep their history
    #[serde(default)]
    pub deleted: bool,
}

impl StoredCardRecord {
    pub fn new(card_id: String, now: DateTime<Utc>) -> Self {
        Self {
            card_id,
            memory_state: MemoryState::new_card(now),
            last_review_date: None,
            deleted: false,
        }
    }
}

/// One of the four review outcomes chosen by the reviewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Grade value used by the scheduling formulas (1-4)
    pub fn grade(self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for Rating {
    type Error = SchedulerError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Again),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            other => Err(SchedulerError::InvalidArgument(format!(
                "rating must be 1-4, got {}",
                other
            ))),
        }
    }
}

impl FromStr for Rating {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "again" | "1" => Ok(Self::Again),
            "hard" | "2" => Ok(Self::Hard),
            "good" | "3" => Ok(Self::Good),
            "easy" | "4" => Ok(Self::Easy),
            _ => Err(SchedulerError::InvalidArgument(format!(
                "unknown rating '{}'",
                s
            ))),
        }
    }
}

/// Statistics over all records in a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub review_cards: usize,
    pub relearning_cards: usize,
    pub due_cards: usize,
    pub deleted_cards: usize,
}
