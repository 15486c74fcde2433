//! # Features Layer
//!
//! Self-contained bot features. Each module carries its own header with
//! version and changelog.

pub mod reminders;

pub use reminders::{
    ReminderScheduler, ReminderService, ReminderStore, SchedulerStatus, TickReport, TriggerEngine,
};
