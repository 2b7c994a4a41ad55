//! Spaced repetition review state for Mnemo
//!
//! This module provides:
//! - The per-card memory state model
//! - FSRS-style scheduling (four candidate outcomes per review)
//! - The review state store with soft deletion and snapshot persistence
//! - The JSON state file layout and storage backends

pub mod algorithm;
pub mod backend;
pub mod models;
pub mod persist;
pub mod storage;

pub use algorithm::{
    format_interval, LearningSteps, Outcome, ScheduleOutcomes, Scheduler, SchedulerConfig,
    SchedulerError,
};
pub use backend::{BackendError, JsonFileBackend, MemoryBackend, StateBackend};
pub use models::*;
pub use storage::{ReviewStateStore, StoreConfig, StoreError, StoreWarning};
