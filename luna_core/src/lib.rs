#![forbid(unsafe_code)]

//! Core domain model and cycle inference for Luna.
//!
//! This crate provides:
//! - Domain types (daily logs, derived cycles, user ids)
//! - Cycle segmentation, statistics and projection
//! - Reminder rules and calendar classification
//! - Persistence (JSON file store, in-memory store)
//! - The [`Tracker`] service tying them together

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod segmenter;
pub mod stats;
pub mod projector;
pub mod reminder;
pub mod calendar;
pub mod store;
pub mod tracker;
pub mod chat;
pub mod csv_io;

// Re-export commonly used types
pub use error::{Error, FieldError, Result};
pub use types::*;
pub use config::Config;
pub use stats::{CycleStats, Regularity};
pub use projector::Projection;
pub use reminder::{
    Direction, ReminderDraft, ReminderEvent, ReminderPatch, ReminderRule, TimeOfDay, Trigger,
};
pub use calendar::{Calendar, DayKind};
pub use store::{JsonStore, MemoryStore, Store};
pub use tracker::{CycleStatus, Tracker};
pub use chat::{ChatContext, ChatResponder};
