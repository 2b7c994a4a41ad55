//! FSRS Spaced Repetition Scheduler
//!
//! Forgetting-curve scheduling in the FSRS family. Each card carries a
//! stability (days until recall probability falls to 90%) and a difficulty
//! (1-10). A review computes four candidate next states, one per rating,
//! and the caller keeps the one matching the reviewer's answer.
//!
//! Ratings:
//! - Again: forgot the answer
//! - Hard: recalled with serious difficulty
//! - Good: recalled after hesitation
//! - Easy: recalled without effort
//!
//! Retrievability after `t` days follows `R = (1 + factor * t / S) ^ decay`
//! where `factor` is chosen so that `R = 0.9` when `t = S`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::{CardPhase, MemoryBounds, MemoryState, Rating};
use crate::config::ConfigError;

/// Default FSRS-4.5 parameter vector
pub const DEFAULT_WEIGHTS: [f64; 17] = [
    0.4072, 1.1829, 3.1262, 15.4722, 7.2102, 0.5316, 1.0651, 0.0234, 1.616, 0.1544, 1.0824,
    1.9813, 0.0953, 0.2975, 2.2042, 0.2407, 2.9466,
];

const MINUTES_PER_DAY: f64 = 1440.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Short fixed steps (in minutes) used before a card graduates to review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct LearningSteps {
    /// First review of a new card rated Again
    pub new_again: u32,
    /// First review of a new card rated Hard
    pub new_hard: u32,
    /// First review of a new card rated Good
    pub new_good: u32,
    /// Learning/relearning card rated Again, and lapsed review cards
    pub again: u32,
    /// Learning/relearning card rated Hard
    pub hard: u32,
}

impl Default for LearningSteps {
    fn default() -> Self {
        Self {
            new_again: 1,
            new_hard: 5,
            new_good: 10,
            again: 5,
            hard: 10,
        }
    }
}

/// Tuning parameters for the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SchedulerConfig {
    /// Recall probability the scheduler aims for at the due date
    pub request_retention: f64,
    /// Longest interval in days
    pub maximum_interval: u32,
    /// Shortest interval in days once a card is in review
    pub minimum_interval: u32,
    /// Exponent of the forgetting curve (negative)
    pub decay: f64,
    pub weights: Vec<f64>,
    pub steps: LearningSteps,
    pub bounds: MemoryBounds,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            request_retention: 0.9,
            maximum_interval: 36500,
            minimum_interval: 1,
            decay: -0.5,
            weights: DEFAULT_WEIGHTS.to_vec(),
            steps: LearningSteps::default(),
            bounds: MemoryBounds::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(self.request_retention > 0.0 && self.request_retention < 1.0) {
            return invalid(format!(
                "request_retention must be between 0 and 1, got {}",
                self.request_retention
            ));
        }
        if !(self.decay.is_finite() && self.decay < 0.0) {
            return invalid(format!("decay must be negative, got {}", self.decay));
        }
        if self.weights.len() != DEFAULT_WEIGHTS.len() {
            return invalid(format!(
                "weights must have {} entries, got {}",
                DEFAULT_WEIGHTS.len(),
                self.weights.len()
            ));
        }
        if self.weights.iter().any(|w| !w.is_finite()) {
            return invalid("weights must be finite numbers".to_string());
        }
        if self.minimum_interval < 1 || self.minimum_interval > self.maximum_interval {
            return invalid(format!(
                "interval bounds must satisfy 1 <= minimum ({}) <= maximum ({})",
                self.minimum_interval, self.maximum_interval
            ));
        }

        let s = &self.steps;
        if [s.new_again, s.new_hard, s.new_good, s.again, s.hard].contains(&0) {
            return invalid("learning steps must be at least one minute".to_string());
        }
        if s.new_again > s.new_hard || s.new_hard > s.new_good || s.again > s.hard {
            return invalid("learning steps must not shrink from Again to Good".to_string());
        }
        let shortest_interval = u64::from(self.minimum_interval) * MINUTES_PER_DAY as u64;
        let longest_step = [s.new_again, s.new_hard, s.new_good, s.again, s.hard]
            .into_iter()
            .max()
            .unwrap_or(0);
        if u64::from(longest_step) >= shortest_interval {
            return invalid(format!(
                "learning steps ({} minutes) must be shorter than minimum_interval ({} days)",
                longest_step, self.minimum_interval
            ));
        }

        let b = &self.bounds;
        if !(b.min_difficulty > 0.0 && b.min_difficulty < b.max_difficulty) {
            return invalid(format!(
                "difficulty bounds must satisfy 0 < min ({}) < max ({})",
                b.min_difficulty, b.max_difficulty
            ));
        }
        if !(b.min_stability > 0.0 && b.min_stability.is_finite()) {
            return invalid(format!(
                "min_stability must be positive, got {}",
                b.min_stability
            ));
        }

        Ok(())
    }
}

/// One candidate result of a review
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub rating: Rating,
    pub next_state: MemoryState,
    /// Time until the next due date, in (possibly fractional) days
    pub interval_days: f64,
}

/// The four candidate results of a review, one per rating
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutcomes {
    pub again: Outcome,
    pub hard: Outcome,
    pub good: Outcome,
    pub easy: Outcome,
}

impl ScheduleOutcomes {
    pub fn get(&self, rating: Rating) -> &Outcome {
        match rating {
            Rating::Again => &self.again,
            Rating::Hard => &self.hard,
            Rating::Good => &self.good,
            Rating::Easy => &self.easy,
        }
    }

    pub fn into_outcome(self, rating: Rating) -> Outcome {
        match rating {
            Rating::Again => self.again,
            Rating::Hard => self.hard,
            Rating::Good => self.good,
            Rating::Easy => self.easy,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        [&self.again, &self.hard, &self.good, &self.easy].into_iter()
    }
}

/// Pure transition function from a memory state to its four successors
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    factor: f64,
}

impl Default for Scheduler {
    fn default() -> Self {
        let config = SchedulerConfig::default();
        let factor = curve_factor(config.decay);
        Self { config, factor }
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let factor = curve_factor(config.decay);
        Ok(Self { config, factor })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Estimated probability of recall at `now`.
    ///
    /// Unreviewed or uninitialized cards count as fully retrievable, and a
    /// `now` earlier than the last review counts as zero elapsed time.
    pub fn retrievability(&self, state: &MemoryState, now: DateTime<Utc>) -> f64 {
        let Some(last) = state.last_reviewed_at else {
            return 1.0;
        };
        if !(state.stability > 0.0) {
            return 1.0;
        }
        let elapsed = elapsed_days(last, now);
        (1.0 + self.factor * elapsed / state.stability).powf(self.config.decay)
    }

    /// Whole-day interval at which recall probability hits the target retention
    pub fn next_interval(&self, stability: f64) -> u32 {
        let min = self.config.minimum_interval as f64;
        let max = self.config.maximum_interval as f64;
        let raw = stability / self.factor
            * (self.config.request_retention.powf(1.0 / self.config.decay) - 1.0);
        let days = if raw.is_finite() { raw.round() } else { max };
        days.clamp(min, max) as u32
    }

    /// Compute the next state for every rating.
    ///
    /// Never fails: malformed input states are clamped into bounds first.
    pub fn schedule(&self, state: &MemoryState, now: DateTime<Utc>) -> ScheduleOutcomes {
        let input = state.clamped(&self.config.bounds);
        let elapsed = input
            .last_reviewed_at
            .map(|last| elapsed_days(last, now).floor() as u32)
            .unwrap_or(0);

        let mut base = input.clone();
        base.review_count = input.review_count.saturating_add(1);
        base.elapsed_days = elapsed;
        base.last_reviewed_at = Some(now);

        let outcomes = match input.phase {
            CardPhase::New => self.schedule_new(&base, now),
            CardPhase::Learning | CardPhase::Relearning => {
                let r = self.retrievability(&input, now);
                self.schedule_learning(&input, &base, r, now)
            }
            CardPhase::Review => {
                let r = self.retrievability(&input, now);
                self.schedule_review(&input, &base, r, now)
            }
        };

        let bounds = &self.config.bounds;
        let [again, hard, good, easy] = outcomes.map(|mut outcome| {
            outcome.next_state = outcome.next_state.clamped(bounds);
            outcome
        });
        ScheduleOutcomes {
            again,
            hard,
            good,
            easy,
        }
    }

    /// Schedule a raw rating value (1-4) coming from a collaborator
    pub fn next(&self, state: &MemoryState, rating: i32, now: DateTime<Utc>) -> Result<Outcome> {
        let rating = Rating::try_from(rating)?;
        Ok(self.schedule(state, now).into_outcome(rating))
    }

    /// Interval in days for each rating: Again, Hard, Good, Easy
    pub fn preview_intervals(&self, state: &MemoryState, now: DateTime<Utc>) -> [f64; 4] {
        let outcomes = self.schedule(state, now);
        Rating::ALL.map(|rating| outcomes.get(rating).interval_days)
    }

    fn schedule_new(&self, base: &MemoryState, now: DateTime<Utc>) -> [Outcome; 4] {
        let steps = &self.config.steps;
        Rating::ALL.map(|rating| {
            let mut next = base.clone();
            next.stability = self.init_stability(rating);
            next.difficulty = self.init_difficulty(rating);
            let minutes = match rating {
                Rating::Again => steps.new_again,
                Rating::Hard => steps.new_hard,
                Rating::Good => steps.new_good,
                Rating::Easy => {
                    let interval = self.next_interval(next.stability);
                    return day_outcome(rating, next, interval, now);
                }
            };
            step_outcome(rating, next, CardPhase::Learning, minutes, now)
        })
    }

    fn schedule_learning(
        &self,
        input: &MemoryState,
        base: &MemoryState,
        r: f64,
        now: DateTime<Utc>,
    ) -> [Outcome; 4] {
        let steps = &self.config.steps;
        let [again, hard, good, easy] = self.successor_states(input, base, r);

        let good_interval = self.next_interval(good.stability);
        let easy_interval = self
            .next_interval(easy.stability)
            .max(good_interval.saturating_add(1))
            .min(self.config.maximum_interval);

        [
            step_outcome(Rating::Again, again, input.phase, steps.again, now),
            step_outcome(Rating::Hard, hard, input.phase, steps.hard, now),
            day_outcome(Rating::Good, good, good_interval, now),
            day_outcome(Rating::Easy, easy, easy_interval, now),
        ]
    }

    fn schedule_review(
        &self,
        input: &MemoryState,
        base: &MemoryState,
        r: f64,
        now: DateTime<Utc>,
    ) -> [Outcome; 4] {
        let max = self.config.maximum_interval;
        let [mut again, hard, good, easy] = self.successor_states(input, base, r);
        again.lapse_count = input.lapse_count.saturating_add(1);

        let mut hard_interval = self.next_interval(hard.stability);
        let mut good_interval = self.next_interval(good.stability);
        hard_interval = hard_interval.min(good_interval);
        good_interval = good_interval.max(hard_interval.saturating_add(1)).min(max);
        let easy_interval = self
            .next_interval(easy.stability)
            .max(good_interval.saturating_add(1))
            .min(max);

        [
            step_outcome(
                Rating::Again,
                again,
                CardPhase::Relearning,
                self.config.steps.again,
                now,
            ),
            day_outcome(Rating::Hard, hard, hard_interval, now),
            day_outcome(Rating::Good, good, good_interval, now),
            day_outcome(Rating::Easy, easy, easy_interval, now),
        ]
    }

    /// Updated difficulty/stability for each rating of an initialized card
    fn successor_states(
        &self,
        input: &MemoryState,
        base: &MemoryState,
        r: f64,
    ) -> [MemoryState; 4] {
        Rating::ALL.map(|rating| {
            let mut next = base.clone();
            next.difficulty = self.next_difficulty(input.difficulty, rating);
            next.stability = match rating {
                Rating::Again => self.forget_stability(input.difficulty, input.stability, r),
                _ => self.recall_stability(input.difficulty, input.stability, r, rating),
            };
            next
        })
    }

    fn w(&self, i: usize) -> f64 {
        self.config.weights[i]
    }

    fn init_stability(&self, rating: Rating) -> f64 {
        self.w(rating.grade() as usize - 1)
            .max(self.config.bounds.min_stability)
    }

    fn init_difficulty(&self, rating: Rating) -> f64 {
        let g = rating.grade() as f64;
        self.constrain_difficulty(self.w(4) - (g - 3.0) * self.w(5))
    }

    fn next_difficulty(&self, difficulty: f64, rating: Rating) -> f64 {
        let g = rating.grade() as f64;
        let shifted = difficulty - self.w(6) * (g - 3.0);
        let reverted = self.w(7) * self.init_difficulty(Rating::Easy) + (1.0 - self.w(7)) * shifted;
        self.constrain_difficulty(reverted)
    }

    fn constrain_difficulty(&self, difficulty: f64) -> f64 {
        let bounds = &self.config.bounds;
        difficulty.clamp(bounds.min_difficulty, bounds.max_difficulty)
    }

    fn recall_stability(&self, d: f64, s: f64, r: f64, rating: Rating) -> f64 {
        let hard_penalty = if rating == Rating::Hard { self.w(15) } else { 1.0 };
        let easy_bonus = if rating == Rating::Easy { self.w(16) } else { 1.0 };
        s * (1.0
            + self.w(8).exp()
                * (11.0 - d)
                * s.powf(-self.w(9))
                * (((1.0 - r) * self.w(10)).exp() - 1.0)
                * hard_penalty
                * easy_bonus)
    }

    fn forget_stability(&self, d: f64, s: f64, r: f64) -> f64 {
        let forgotten = self.w(11)
            * d.powf(-self.w(12))
            * ((s + 1.0).powf(self.w(13)) - 1.0)
            * ((1.0 - r) * self.w(14)).exp();
        forgotten.min(s)
    }
}

fn curve_factor(decay: f64) -> f64 {
    0.9_f64.powf(1.0 / decay) - 1.0
}

fn elapsed_days(last: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - last).num_milliseconds().max(0);
    millis as f64 / MILLIS_PER_DAY
}

/// `now + delay`, saturating at the latest representable instant
fn shift_due(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn step_outcome(
    rating: Rating,
    mut next: MemoryState,
    phase: CardPhase,
    minutes: u32,
    now: DateTime<Utc>,
) -> Outcome {
    next.phase = phase;
    next.scheduled_days = 0;
    next.due_at = shift_due(now, Duration::minutes(minutes as i64));
    Outcome {
        rating,
        next_state: next,
        interval_days: minutes as f64 / MINUTES_PER_DAY,
    }
}

fn day_outcome(rating: Rating, mut next: MemoryState, days: u32, now: DateTime<Utc>) -> Outcome {
    next.phase = CardPhase::Review;
    next.scheduled_days = days;
    next.due_at = shift_due(now, Duration::days(days as i64));
    Outcome {
        rating,
        next_state: next,
        interval_days: days as f64,
    }
}

/// Format an interval in days to a short human-readable string
pub fn format_interval(days: f64) -> String {
    if days <= 0.0 {
        return "now".to_string();
    }

    let minutes = (days * MINUTES_PER_DAY).round() as i64;
    if minutes < 60 {
        return format!("{}m", minutes.max(1));
    }
    if minutes < 1440 {
        return format!("{}h", minutes / 60);
    }

    let days = days.round() as i64;
    if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}
