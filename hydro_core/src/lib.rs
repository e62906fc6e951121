#![forbid(unsafe_code)]

//! Core domain model and business logic for hydrate.
//!
//! This crate provides:
//! - Domain types (log entries, units, preferences, derived stats)
//! - Streak and aggregate engine
//! - Health formulas (unit conversion, BMI, calories, hydration goal)
//! - Persistence (JSONL journal, preferences file, CSV export)
//! - Reminder policy with injectable scheduling

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod validate;
pub mod health;
pub mod stats;
pub mod store;
pub mod preferences;
pub mod tracker;
pub mod reminder;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use stats::{compute_stats, StreakOptions};
pub use store::{JournalStore, LogStore, MemoryStore};
pub use preferences::{JsonPreferencesStore, PreferencesStore};
pub use tracker::{AddOutcome, ChangeEvent, Tracker};
pub use reminder::{Notifier, Reminder, ReminderPolicy, ReminderService, Scheduler, ThreadScheduler};
