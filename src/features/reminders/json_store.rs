//! JSON file reminder store
//!
//! Keeps the whole collection as one pretty-printed JSON array. Every call
//! reloads the file, so edits made by another tool between ticks are picked
//! up. Writes go through a temp file and a rename. An entry that no longer
//! decodes is skipped on read but kept in the file.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.1.0
//!
//! ## Changelog
//! - 1.1.0: Decode entries one at a time so one bad entry cannot hide the rest
//! - 1.0.0: Initial whole-file store

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::model::Reminder;
use super::store::ReminderStore;
use crate::core::{ReminderError, ReminderResult};

pub struct JsonFileReminderStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonFileReminderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry as stored, including ones that no longer decode
    async fn load_raw(&self) -> ReminderResult<Vec<Value>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No reminder file at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if data.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&data).map_err(|e| {
            warn!("Reminder file {} is not valid JSON: {}", self.path.display(), e);
            ReminderError::from(e)
        })
    }

    /// Decoded reminders; entries that fail to decode are logged and skipped
    async fn load(&self) -> ReminderResult<Vec<Reminder>> {
        Ok(self
            .load_raw()
            .await?
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Reminder>(entry.clone()) {
                Ok(reminder) => Some(reminder),
                Err(e) => {
                    warn!(
                        "Skipping unreadable reminder {} in {}: {}",
                        entry_id(&entry).unwrap_or("<no id>"),
                        self.path.display(),
                        e
                    );
                    None
                }
            })
            .collect())
    }

    async fn save(&self, entries: &[Value]) -> ReminderResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn entry_id(entry: &Value) -> Option<&str> {
    entry.get("id").and_then(Value::as_str)
}

#[async_trait]
impl ReminderStore for JsonFileReminderStore {
    async fn get_active(&self) -> ReminderResult<Vec<Reminder>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().filter(|r| r.is_active).collect())
    }

    async fn get_by_id(&self, id: &str) -> ReminderResult<Option<Reminder>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|r| r.id == id))
    }

    async fn get_by_owner(&self, user_id: &str) -> ReminderResult<Vec<Reminder>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect())
    }

    // Writes work on raw entries so an unreadable one is kept for repair rather than dropped

    async fn insert(&self, reminder: Reminder) -> ReminderResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_raw().await?;
        if entries.iter().any(|e| entry_id(e) == Some(reminder.id.as_str())) {
            return Err(ReminderError::already_exists(reminder.id));
        }
        entries.push(serde_json::to_value(&reminder)?);
        self.save(&entries).await
    }

    async fn replace(&self, reminder: Reminder) -> ReminderResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_raw().await?;
        let slot = entries
            .iter_mut()
            .find(|e| entry_id(e) == Some(reminder.id.as_str()))
            .ok_or_else(|| ReminderError::not_found(reminder.id.clone()))?;
        *slot = serde_json::to_value(&reminder)?;
        self.save(&entries).await
    }

    async fn delete(&self, id: &str) -> ReminderResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_raw().await?;
        let before = entries.len();
        entries.retain(|e| entry_id(e) != Some(id));
        if entries.len() == before {
            return Err(ReminderError::not_found(id));
        }
        self.save(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reminders::store::tests::{check_store_contract, sample};

    #[tokio::test]
    async fn test_json_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileReminderStore::new(dir.path().join("nested/reminders.json"));
        check_store_contract(&store).await;
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileReminderStore::new(dir.path().join("reminders.json"));
        assert!(store.get_active().await.unwrap().is_empty());
        assert!(store.get_by_id("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminders.json");
        {
            let store = JsonFileReminderStore::new(&path);
            store.insert(sample("a", "alice", "g1")).await.unwrap();
        }
        let reopened = JsonFileReminderStore::new(&path);
        let fetched = reopened.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(fetched, sample("a", "alice", "g1"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_skipped_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminders.json");
        let good = serde_json::to_value(sample("good", "alice", "g1")).unwrap();
        let bad = serde_json::json!({ "id": "bad", "timezone": "Mars/Base" });
        std::fs::write(&path, serde_json::to_string(&vec![good, bad]).unwrap()).unwrap();

        let store = JsonFileReminderStore::new(&path);
        let active = store.get_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "good");

        let mut updated = active[0].clone();
        updated.is_active = false;
        store.replace(updated).await.unwrap();

        let raw: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[1]["timezone"], "Mars/Base");
        // The unreadable entry still holds its id
        let dup = store.insert(sample("bad", "alice", "g1")).await.unwrap_err();
        assert!(matches!(dup, ReminderError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reminders.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonFileReminderStore::new(&path);
        let err = store.get_active().await.unwrap_err();
        assert!(matches!(err, ReminderError::Serialization(_)));
    }
}
