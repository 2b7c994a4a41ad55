pub mod add;
pub mod delete;
pub mod due;
pub mod preview;
pub mod review;
pub mod show;
pub mod stats;

use chrono::{DateTime, Utc};

use mnemo_lib::flashcards::StoredCardRecord;

/// JSON view of a record shared by several commands
pub fn record_json(record: &StoredCardRecord) -> serde_json::Value {
    let state = &record.memory_state;
    serde_json::json!({
        "cardId": record.card_id,
        "phase": state.phase.as_str(),
        "dueAt": state.due_at.to_rfc3339(),
        "stability": state.stability,
        "difficulty": state.difficulty,
        "reviewCount": state.review_count,
        "lapseCount": state.lapse_count,
        "lastReviewedAt": state.last_reviewed_at.map(|t| t.to_rfc3339()),
        "deleted": record.deleted,
    })
}

/// Format a timestamp relative to `now` for plain output
pub fn format_due(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let stamp = due.format("%Y-%m-%d %H:%M").to_string();
    if due <= now {
        format!("{} (due)", stamp)
    } else {
        let days = (due - now).num_minutes() as f64 / 1440.0;
        format!("{} (in {})", stamp, mnemo_lib::flashcards::format_interval(days))
    }
}
