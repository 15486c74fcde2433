//! Reminder error taxonomy
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.2.0: Add `StalledInterval` for intervals that never advance
//! - 1.1.0: Add `Forbidden` for owner-checked edits
//! - 1.0.0: Initial validation / configuration / delivery / storage split

use thiserror::Error;

/// Result type alias for reminder operations.
pub type ReminderResult<T> = Result<T, ReminderError>;

/// Errors raised by the reminder engine, its stores and its notifiers.
#[derive(Debug, Error)]
pub enum ReminderError {
    /// Bad input at creation or edit time
    #[error("Invalid reminder: {message}")]
    Validation { message: String },

    /// The day filter admits no weekday within the probe budget
    #[error("Day filter admits no legal day within {probes} days")]
    NoLegalDay { probes: u32 },

    /// The recurrence interval does not move the trigger time forward
    #[error("Recurrence interval does not advance: {reason}")]
    StalledInterval { reason: String },

    #[error("Reminder not found: {id}")]
    NotFound { id: String },

    #[error("Reminder already exists: {id}")]
    AlreadyExists { id: String },

    /// The caller does not own the reminder
    #[error("Reminder {id} does not belong to this user")]
    Forbidden { id: String },

    /// Notifier could not deliver to the destination
    #[error("Delivery to {destination} failed: {message}")]
    Delivery {
        destination: String,
        message: String,
    },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] sqlite::Error),
}

impl ReminderError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    pub fn forbidden(id: impl Into<String>) -> Self {
        Self::Forbidden { id: id.into() }
    }

    pub fn delivery(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            destination: destination.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn stalled_interval(reason: impl Into<String>) -> Self {
        Self::StalledInterval {
            reason: reason.into(),
        }
    }

    /// True for errors caused by a reminder's own configuration (day filter or interval)
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NoLegalDay { .. } | Self::StalledInterval { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ReminderError::not_found("abc").to_string(),
            "Reminder not found: abc"
        );
        assert_eq!(
            ReminderError::NoLegalDay { probes: 14 }.to_string(),
            "Day filter admits no legal day within 14 days"
        );
        assert_eq!(
            ReminderError::delivery("123", "Missing Access").to_string(),
            "Delivery to 123 failed: Missing Access"
        );
    }

    #[test]
    fn test_classification() {
        assert!(ReminderError::NoLegalDay { probes: 14 }.is_configuration());
        assert!(ReminderError::stalled_interval("every 0 minutes").is_configuration());
        assert!(!ReminderError::validation("x").is_configuration());
        assert!(ReminderError::not_found("x").is_not_found());
        assert!(!ReminderError::storage("x").is_not_found());
    }
}
