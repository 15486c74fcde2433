//! # Feature: Reminders
//!
//! Recurring team reminders: once, daily, weekly, monthly or every N minutes,
//! with weekday filters, occurrence caps and end dates. A background scheduler
//! polls the store once a minute and posts due reminders to their channel.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 2.0.0: Store-backed polling scheduler, day filters, SQLite and JSON stores
//! - 1.0.0: Initial once/daily reminders

pub mod calendar;
pub mod engine;
pub mod json_store;
pub mod model;
pub mod notifier;
pub mod scheduler;
pub mod service;
pub mod sqlite_store;
pub mod store;

pub use engine::{Transition, TriggerEngine, TriggerState};
pub use json_store::JsonFileReminderStore;
pub use model::{
    DayFilter, DayOfWeek, Recurrence, RecurrenceInterval, Reminder, ReminderComment, ReminderKind,
};
pub use notifier::{DefaultRenderer, DiscordNotifier, MessageRenderer, Notifier, RenderedMessage};
pub use scheduler::{ReminderScheduler, SchedulerConfig, SchedulerStatus, TickReport};
pub use service::{
    parse_time_expression, CreateReminder, CreateWeeklyReminder, ReminderService, UpdateReminder,
};
pub use sqlite_store::SqliteReminderStore;
pub use store::{MemoryReminderStore, ReminderStore};

use std::sync::Arc;

use crate::core::{Config, ReminderResult, StoreBackend};

/// Open the store selected by `config.store_backend`
pub fn open_store(config: &Config) -> ReminderResult<Arc<dyn ReminderStore>> {
    let store: Arc<dyn ReminderStore> = match config.store_backend {
        StoreBackend::Sqlite => Arc::new(SqliteReminderStore::open(&config.database_path)?),
        StoreBackend::Json => Arc::new(JsonFileReminderStore::new(&config.reminders_json_path)),
    };
    Ok(store)
}
