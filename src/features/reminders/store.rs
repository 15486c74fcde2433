//! Reminder persistence contract and the in-memory store
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Add delete and per-guild owner lookup
//! - 1.0.0: Initial store trait with DashMap-backed implementation

use async_trait::async_trait;
use dashmap::DashMap;

use super::model::Reminder;
use crate::core::{ReminderError, ReminderResult};

/// Durable keyed collection of reminders
///
/// Every mutating call must have persisted before it returns `Ok`.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// All reminders with `is_active = true`
    async fn get_active(&self) -> ReminderResult<Vec<Reminder>>;

    async fn get_by_id(&self, id: &str) -> ReminderResult<Option<Reminder>>;

    async fn get_by_owner(&self, user_id: &str) -> ReminderResult<Vec<Reminder>>;

    async fn get_by_owner_in_guild(
        &self,
        user_id: &str,
        guild_id: &str,
    ) -> ReminderResult<Vec<Reminder>> {
        Ok(self
            .get_by_owner(user_id)
            .await?
            .into_iter()
            .filter(|r| r.guild_id == guild_id)
            .collect())
    }

    /// Fails with `AlreadyExists` if the id is taken
    async fn insert(&self, reminder: Reminder) -> ReminderResult<()>;

    /// Fails with `NotFound` if the id is unknown
    async fn replace(&self, reminder: Reminder) -> ReminderResult<()>;

    /// Fails with `NotFound` if the id is unknown
    async fn delete(&self, id: &str) -> ReminderResult<()>;
}

/// Keeps reminders in memory only; contents are lost on restart
#[derive(Default)]
pub struct MemoryReminderStore {
    reminders: DashMap<String, Reminder>,
}

impl MemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }
}

#[async_trait]
impl ReminderStore for MemoryReminderStore {
    async fn get_active(&self) -> ReminderResult<Vec<Reminder>> {
        let mut active: Vec<Reminder> = self
            .reminders
            .iter()
            .filter(|r| r.is_active)
            .map(|r| r.clone())
            .collect();
        active.sort_by(|a, b| a.next_trigger_time.cmp(&b.next_trigger_time));
        Ok(active)
    }

    async fn get_by_id(&self, id: &str) -> ReminderResult<Option<Reminder>> {
        Ok(self.reminders.get(id).map(|r| r.clone()))
    }

    async fn get_by_owner(&self, user_id: &str) -> ReminderResult<Vec<Reminder>> {
        let mut owned: Vec<Reminder> = self
            .reminders
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.clone())
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(owned)
    }

    async fn insert(&self, reminder: Reminder) -> ReminderResult<()> {
        match self.reminders.entry(reminder.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ReminderError::already_exists(reminder.id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(reminder);
                Ok(())
            }
        }
    }

    async fn replace(&self, reminder: Reminder) -> ReminderResult<()> {
        match self.reminders.get_mut(&reminder.id) {
            Some(mut existing) => {
                *existing = reminder;
                Ok(())
            }
            None => Err(ReminderError::not_found(reminder.id)),
        }
    }

    async fn delete(&self, id: &str) -> ReminderResult<()> {
        self.reminders
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ReminderError::not_found(id))
    }
}
