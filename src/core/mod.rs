//! # Core Module
//!
//! Configuration, error taxonomy and Discord text limits shared by the bot.
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Add error module with the reminder error taxonomy
//! - 1.1.0: Add response module with Discord truncation utilities
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod error;
pub mod response;

// Re-export commonly used items
pub use config::{Config, StoreBackend};
pub use error::{ReminderError, ReminderResult};
pub use response::{
    truncate_for_embed, truncate_for_message, truncate_for_title, truncate_to, EMBED_FIELD_LIMIT,
    EMBED_LIMIT, EMBED_TITLE_LIMIT, MESSAGE_LIMIT,
};
