// Core layer - shared types and configuration
pub mod core;

// Features layer - all feature modules
pub mod features;

// Re-export core items for convenience
pub use crate::core::{Config, ReminderError, ReminderResult};

// Re-export feature items
pub use features::{
    ReminderScheduler, ReminderService, ReminderStore, SchedulerStatus, TickReport, TriggerEngine,
};
