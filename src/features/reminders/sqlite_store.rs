//! SQLite reminder store
//!
//! One `reminders` table: lookup columns are kept alongside the full record,
//! which is stored as JSON in `data` so schema changes to `Reminder` need no
//! migration. Rows whose `data` no longer decodes are logged and skipped.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Skip undecodable rows instead of failing the whole query
//! - 1.0.0: Initial table with JSON payload

use async_trait::async_trait;
use log::{info, warn};
use sqlite::{Connection, State};
use std::sync::{Arc, Mutex};

use super::model::Reminder;
use super::store::ReminderStore;
use crate::core::{ReminderError, ReminderResult};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reminders (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        guild_id TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        next_trigger_time TEXT NOT NULL,
        data TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_reminders_active ON reminders(is_active, next_trigger_time);
    CREATE INDEX IF NOT EXISTS idx_reminders_user ON reminders(user_id, guild_id);
";

#[derive(Clone)]
pub struct SqliteReminderStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReminderStore {
    /// Open (or create) the database at `path` and ensure the schema exists
    pub fn open(path: &str) -> ReminderResult<Self> {
        let conn = sqlite::open(path)?;
        conn.execute(SCHEMA)?;
        info!("Opened reminder database at {path}");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A private in-memory database
    pub fn in_memory() -> ReminderResult<Self> {
        Self::open(":memory:")
    }

    /// Run a blocking closure against the connection off the async runtime
    async fn with_conn<T, F>(&self, f: F) -> ReminderResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> ReminderResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ReminderError::storage("reminder database lock poisoned"))?;
            f(&guard)
        })
        .await
        .map_err(|e| ReminderError::storage(format!("database task failed: {e}")))?
    }
}

fn query_reminders(conn: &Connection, sql: &str, params: &[&str]) -> ReminderResult<Vec<Reminder>> {
    let mut statement = conn.prepare(sql)?;
    for (i, value) in params.iter().enumerate() {
        statement.bind((i + 1, *value))?;
    }

    let mut reminders = Vec::new();
    while let State::Row = statement.next()? {
        let id = statement.read::<String, _>("id")?;
        let data = statement.read::<String, _>("data")?;
        match serde_json::from_str(&data) {
            Ok(reminder) => reminders.push(reminder),
            Err(e) => warn!("Skipping unreadable reminder row {id}: {e}"),
        }
    }
    Ok(reminders)
}

fn exists(conn: &Connection, id: &str) -> ReminderResult<bool> {
    let mut statement = conn.prepare("SELECT 1 FROM reminders WHERE id = ?")?;
    statement.bind((1, id))?;
    Ok(matches!(statement.next()?, State::Row))
}

fn write_row(conn: &Connection, sql: &str, reminder: &Reminder) -> ReminderResult<()> {
    let data = serde_json::to_string(reminder)?;
    let next_trigger = reminder.next_trigger_time.to_rfc3339();
    let mut statement = conn.prepare(sql)?;
    statement.bind((1, reminder.user_id.as_str()))?;
    statement.bind((2, reminder.guild_id.as_str()))?;
    statement.bind((3, i64::from(reminder.is_active)))?;
    statement.bind((4, next_trigger.as_str()))?;
    statement.bind((5, data.as_str()))?;
    statement.bind((6, reminder.id.as_str()))?;
    while let State::Row = statement.next()? {}
    Ok(())
}

#[async_trait]
impl ReminderStore for SqliteReminderStore {
    async fn get_active(&self) -> ReminderResult<Vec<Reminder>> {
        self.with_conn(|conn| {
            query_reminders(
                conn,
                "SELECT id, data FROM reminders WHERE is_active = 1 ORDER BY next_trigger_time",
                &[],
            )
        })
        .await
    }

    async fn get_by_id(&self, id: &str) -> ReminderResult<Option<Reminder>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            Ok(query_reminders(conn, "SELECT id, data FROM reminders WHERE id = ?", &[id.as_str()])?
                .into_iter()
                .next())
        })
        .await
    }

    async fn get_by_owner(&self, user_id: &str) -> ReminderResult<Vec<Reminder>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            query_reminders(
                conn,
                "SELECT id, data FROM reminders WHERE user_id = ? ORDER BY rowid",
                &[user_id.as_str()],
            )
        })
        .await
    }

    async fn get_by_owner_in_guild(
        &self,
        user_id: &str,
        guild_id: &str,
    ) -> ReminderResult<Vec<Reminder>> {
        let user_id = user_id.to_string();
        let guild_id = guild_id.to_string();
        self.with_conn(move |conn| {
            query_reminders(
                conn,
                "SELECT id, data FROM reminders WHERE user_id = ? AND guild_id = ? ORDER BY rowid",
                &[user_id.as_str(), guild_id.as_str()],
            )
        })
        .await
    }

    async fn insert(&self, reminder: Reminder) -> ReminderResult<()> {
        self.with_conn(move |conn| {
            if exists(conn, &reminder.id)? {
                return Err(ReminderError::already_exists(reminder.id.clone()));
            }
            write_row(
                conn,
                "INSERT INTO reminders (user_id, guild_id, is_active, next_trigger_time, data, id)
                 VALUES (?, ?, ?, ?, ?, ?)",
                &reminder,
            )
        })
        .await
    }

    async fn replace(&self, reminder: Reminder) -> ReminderResult<()> {
        self.with_conn(move |conn| {
            if !exists(conn, &reminder.id)? {
                return Err(ReminderError::not_found(reminder.id.clone()));
            }
            write_row(
                conn,
                "UPDATE reminders
                 SET user_id = ?, guild_id = ?, is_active = ?, next_trigger_time = ?, data = ?
                 WHERE id = ?",
                &reminder,
            )
        })
        .await
    }

    async fn delete(&self, id: &str) -> ReminderResult<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            if !exists(conn, &id)? {
                return Err(ReminderError::not_found(id));
            }
            let mut statement = conn.prepare("DELETE FROM reminders WHERE id = ?")?;
            statement.bind((1, id.as_str()))?;
            while let State::Row = statement.next()? {}
            Ok(())
        })
        .await
    }
}
