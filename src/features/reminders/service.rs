//! # Reminder Service
//!
//! Validation boundary for reminder creation and edits. Command handlers go
//! through here; the scheduler only ever sees reminders this service accepted.
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.2.0: Weekly day-of-week reminders, comments
//! - 1.1.0: Owner checks on edit/delete, compound relative times (`1h30m`)
//! - 1.0.0: Create/update/delete with `30m` / `HH:MM` / absolute time parsing

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use log::info;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

use super::calendar;
use super::engine::TriggerEngine;
use super::model::{
    DayFilter, DayOfWeek, Recurrence, RecurrenceInterval, Reminder, ReminderComment, ReminderKind,
};
use super::store::ReminderStore;
use crate::core::{Config, ReminderError, ReminderResult, EMBED_FIELD_LIMIT, EMBED_LIMIT, EMBED_TITLE_LIMIT};

/// Source of the current instant
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Upper bound on interval steps taken when catching a stale reminder up to now
const MAX_CATCH_UP_STEPS: u32 = 10_000;

/// Everything needed to create a reminder
#[derive(Debug, Clone)]
pub struct CreateReminder {
    pub user_id: String,
    pub channel_id: String,
    pub guild_id: String,
    pub title: String,
    pub message: String,
    /// Time expression, see [`parse_time_expression`]
    pub time: String,
    /// Falls back to the service default
    pub timezone: Option<Tz>,
    /// Occurrence counters in a recurring schedule are ignored and start at zero
    pub schedule: ReminderKind,
}

/// A reminder on one weekday at a fixed local time
#[derive(Debug, Clone)]
pub struct CreateWeeklyReminder {
    pub user_id: String,
    pub channel_id: String,
    pub guild_id: String,
    pub title: String,
    pub message: String,
    pub day: DayOfWeek,
    pub time: NaiveTime,
    pub timezone: Option<Tz>,
}

/// Partial edit; `None` leaves a field as it is
#[derive(Debug, Clone, Default)]
pub struct UpdateReminder {
    pub title: Option<String>,
    pub message: Option<String>,
    pub time: Option<String>,
    /// Only valid on recurring reminders
    pub day_filter: Option<DayFilter>,
}

pub struct ReminderService {
    store: Arc<dyn ReminderStore>,
    engine: TriggerEngine,
    default_timezone: Tz,
    clock: Clock,
}

impl ReminderService {
    pub fn new(store: Arc<dyn ReminderStore>, engine: TriggerEngine, default_timezone: Tz) -> Self {
        Self {
            store,
            engine,
            default_timezone,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn from_config(store: Arc<dyn ReminderStore>, config: &Config) -> Self {
        Self::new(
            store,
            TriggerEngine::new(config.probe_budget),
            config.default_timezone,
        )
    }

    /// Replace the wall clock, mostly for tests
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_timezone(&self) -> Tz {
        self.default_timezone
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub async fn create(&self, request: CreateReminder) -> ReminderResult<Reminder> {
        let now = self.now();
        require("User ID", &request.user_id)?;
        require("Channel ID", &request.channel_id)?;
        require("Guild ID", &request.guild_id)?;
        validate_title(&request.title)?;
        validate_message(&request.message)?;
        require("Time", &request.time)?;

        let tz = request.timezone.unwrap_or(self.default_timezone);
        let trigger = parse_time_expression(&request.time, now, tz)?;

        let kind = match request.schedule {
            ReminderKind::Once => {
                if trigger < now {
                    return Err(ReminderError::validation("Cannot set reminder for past time"));
                }
                ReminderKind::Once
            }
            ReminderKind::Recurring(recurrence) => {
                validate_recurrence(&recurrence, now)?;
                ReminderKind::Recurring(Recurrence {
                    occurrence_count: 0,
                    ..recurrence
                })
            }
        };

        let mut reminder = Reminder {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id,
            channel_id: request.channel_id,
            guild_id: request.guild_id,
            title: request.title,
            message: request.message,
            next_trigger_time: trigger,
            timezone: tz,
            kind,
            is_active: true,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        reminder.next_trigger_time = self.engine.align(trigger, tz, reminder.day_filter())?;

        self.store.insert(reminder.clone()).await?;
        info!(
            "Created reminder {} ({}) for user {}, first at {}",
            reminder.id, reminder.title, reminder.user_id, reminder.next_trigger_time
        );
        Ok(reminder)
    }

    /// Weekly reminder on `day` at `time`, first firing at the next such moment
    pub async fn create_weekly(&self, request: CreateWeeklyReminder) -> ReminderResult<Reminder> {
        let now = self.now();
        require("User ID", &request.user_id)?;
        require("Channel ID", &request.channel_id)?;
        require("Guild ID", &request.guild_id)?;
        validate_title(&request.title)?;
        validate_message(&request.message)?;

        let tz = request.timezone.unwrap_or(self.default_timezone);
        let first = next_weekday_at(request.day, request.time, now, tz)?;
        let recurrence =
            Recurrence::new(RecurrenceInterval::Weekly).with_day_filter(DayFilter::only([request.day]));

        let reminder = Reminder {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id,
            channel_id: request.channel_id,
            guild_id: request.guild_id,
            title: request.title,
            message: request.message,
            next_trigger_time: first,
            timezone: tz,
            kind: ReminderKind::Recurring(recurrence),
            is_active: true,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.store.insert(reminder.clone()).await?;
        info!(
            "Created weekly reminder {} for user {} on {} at {}",
            reminder.id, reminder.user_id, request.day, request.time
        );
        Ok(reminder)
    }

    pub async fn get(&self, id: &str) -> ReminderResult<Reminder> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| ReminderError::not_found(id))
    }

    async fn get_owned(&self, id: &str, user_id: &str) -> ReminderResult<Reminder> {
        let reminder = self.get(id).await?;
        if reminder.user_id != user_id {
            return Err(ReminderError::forbidden(id));
        }
        Ok(reminder)
    }

    pub async fn update(
        &self,
        id: &str,
        user_id: &str,
        changes: UpdateReminder,
    ) -> ReminderResult<Reminder> {
        let now = self.now();
        let mut reminder = self.get_owned(id, user_id).await?;

        if let Some(title) = changes.title {
            validate_title(&title)?;
            reminder.title = title;
        }
        if let Some(message) = changes.message {
            validate_message(&message)?;
            reminder.message = message;
        }
        if let Some(time) = changes.time {
            let trigger = parse_time_expression(&time, now, reminder.timezone)?;
            if !reminder.is_recurring() && trigger < now {
                return Err(ReminderError::validation("Cannot set reminder for past time"));
            }
            reminder.next_trigger_time = trigger;
        }
        if let Some(filter) = changes.day_filter {
            if !filter.admits_any_day() {
                return Err(ReminderError::validation("Day filter excludes every day of the week"));
            }
            match &mut reminder.kind {
                ReminderKind::Recurring(recurrence) => recurrence.day_filter = Some(filter),
                ReminderKind::Once => {
                    return Err(ReminderError::validation(
                        "Day filters only apply to recurring reminders",
                    ))
                }
            }
        }

        reminder.next_trigger_time =
            self.engine
                .align(reminder.next_trigger_time, reminder.timezone, reminder.day_filter())?;
        reminder.touch(now);

        self.store.replace(reminder.clone()).await?;
        info!("Updated reminder {} for user {}", reminder.id, user_id);
        Ok(reminder)
    }

    /// Flip `is_active` and return the new state
    pub async fn toggle(&self, id: &str, user_id: &str) -> ReminderResult<Reminder> {
        let now = self.now();
        let mut reminder = self.get_owned(id, user_id).await?;

        if reminder.is_active {
            reminder.is_active = false;
        } else {
            reminder.next_trigger_time = self.catch_up(&reminder, now)?;
            reminder.is_active = true;
        }
        reminder.touch(now);

        self.store.replace(reminder.clone()).await?;
        info!(
            "Reminder {} {}",
            reminder.id,
            if reminder.is_active { "activated" } else { "paused" }
        );
        Ok(reminder)
    }

    /// First trigger time at or after `now` that the reminder's schedule allows
    fn catch_up(&self, reminder: &Reminder, now: DateTime<Utc>) -> ReminderResult<DateTime<Utc>> {
        let recurrence = match &reminder.kind {
            ReminderKind::Once if reminder.next_trigger_time < now => {
                return Err(ReminderError::validation(
                    "Cannot reactivate a one-time reminder whose time has passed",
                ))
            }
            ReminderKind::Once => return Ok(reminder.next_trigger_time),
            ReminderKind::Recurring(recurrence) => recurrence,
        };

        let mut next = reminder.next_trigger_time;
        match recurrence.interval {
            RecurrenceInterval::Custom { minutes } if next < now => {
                let step = i64::from(minutes.max(1)) * 60;
                let behind = (now - next).num_seconds();
                let steps = (behind + step - 1) / step;
                next += Duration::seconds(steps * step);
            }
            interval => {
                let mut steps = 0;
                while next < now && steps < MAX_CATCH_UP_STEPS {
                    next = calendar::advance(next, reminder.timezone, &interval);
                    steps += 1;
                }
            }
        }
        if next < now {
            return Err(ReminderError::validation(
                "Reminder is too far behind to resume; set a new time instead",
            ));
        }

        self.engine
            .align(next, reminder.timezone, recurrence.day_filter.as_ref())
    }

    pub async fn delete(&self, id: &str, user_id: &str) -> ReminderResult<()> {
        self.get_owned(id, user_id).await?;
        self.store.delete(id).await?;
        info!("Deleted reminder {id} for user {user_id}");
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: &str) -> ReminderResult<Vec<Reminder>> {
        self.store.get_by_owner(user_id).await
    }

    pub async fn list_for_user_in_guild(
        &self,
        user_id: &str,
        guild_id: &str,
    ) -> ReminderResult<Vec<Reminder>> {
        self.store.get_by_owner_in_guild(user_id, guild_id).await
    }

    /// Attach a comment; any member may comment on a reminder
    pub async fn add_comment(
        &self,
        id: &str,
        user_id: &str,
        content: &str,
    ) -> ReminderResult<ReminderComment> {
        let now = self.now();
        let content = content.trim();
        require("Comment", content)?;
        if content.chars().count() > EMBED_FIELD_LIMIT {
            return Err(ReminderError::validation(format!(
                "Comment must be at most {EMBED_FIELD_LIMIT} characters"
            )));
        }

        let mut reminder = self.get(id).await?;
        let comment = ReminderComment {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            created_at: now,
        };
        reminder.comments.push(comment.clone());
        reminder.touch(now);

        self.store.replace(reminder).await?;
        Ok(comment)
    }
}

fn require(field: &str, value: &str) -> ReminderResult<()> {
    if value.trim().is_empty() {
        return Err(ReminderError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_title(title: &str) -> ReminderResult<()> {
    require("Title", title)?;
    // Leave room for the bell prefix in the embed title
    if title.chars().count() > EMBED_TITLE_LIMIT - 4 {
        return Err(ReminderError::validation(format!(
            "Title must be at most {} characters",
            EMBED_TITLE_LIMIT - 4
        )));
    }
    Ok(())
}

fn validate_message(message: &str) -> ReminderResult<()> {
    require("Message", message)?;
    if message.chars().count() > EMBED_LIMIT {
        return Err(ReminderError::validation(format!(
            "Message must be at most {EMBED_LIMIT} characters"
        )));
    }
    Ok(())
}

fn validate_recurrence(recurrence: &Recurrence, now: DateTime<Utc>) -> ReminderResult<()> {
    if let RecurrenceInterval::Custom { minutes: 0 } = recurrence.interval {
        return Err(ReminderError::validation(
            "Custom interval must be at least one minute",
        ));
    }
    if recurrence.max_occurrences == Some(0) {
        return Err(ReminderError::validation("Max occurrences must be at least 1"));
    }
    if recurrence.end_date.is_some_and(|end| end <= now) {
        return Err(ReminderError::validation("End date must be in the future"));
    }
    if let Some(filter) = &recurrence.day_filter {
        if !filter.admits_any_day() {
            return Err(ReminderError::validation("Day filter excludes every day of the week"));
        }
    }
    Ok(())
}

/// Parse a user-supplied time expression into an instant
///
/// Accepted forms, with wall-clock times read in `tz`:
/// - relative: `30m`, `2h`, `1d`, `1w`, or compounds such as `1h30m`
/// - absolute: `2024-07-15 14:30` (also `2024-07-15T14:30`, or RFC 3339 with an offset)
/// - time of day: `14:30`, today or tomorrow if it has already passed
pub fn parse_time_expression(input: &str, now: DateTime<Utc>, tz: Tz) -> ReminderResult<DateTime<Utc>> {
    let input = input.trim();
    require("Time", input)?;

    if let Some(offset) = parse_relative(input)? {
        return Ok(now + offset);
    }

    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(local) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(calendar::resolve_local(tz, local));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let time_only = Regex::new(r"^(\d{1,2}):(\d{2})$")
        .map_err(|e| ReminderError::validation(format!("Invalid time pattern: {e}")))?;
    if let Some(caps) = time_only.captures(input) {
        let hours: u32 = caps[1].parse().unwrap_or(u32::MAX);
        let minutes: u32 = caps[2].parse().unwrap_or(u32::MAX);
        let time = NaiveTime::from_hms_opt(hours, minutes, 0)
            .ok_or_else(|| ReminderError::validation(format!("Invalid time of day: {input}")))?;

        let today = now.with_timezone(&tz).date_naive();
        let candidate = calendar::resolve_local(tz, today.and_time(time));
        if candidate >= now {
            return Ok(candidate);
        }
        let tomorrow = next_day(today)?;
        return Ok(calendar::resolve_local(tz, tomorrow.and_time(time)));
    }

    Err(ReminderError::validation(format!(
        "Invalid time format: {input} (use 30m, 2h, 1d, HH:MM or YYYY-MM-DD HH:MM)"
    )))
}

/// `Some(offset)` when the whole input is a relative duration
fn parse_relative(input: &str) -> ReminderResult<Option<Duration>> {
    let whole = Regex::new(r"^(?:\d+[mhdw])+$")
        .map_err(|e| ReminderError::validation(format!("Invalid time pattern: {e}")))?;
    if !whole.is_match(input) {
        return Ok(None);
    }

    let part = Regex::new(r"(\d+)([mhdw])")
        .map_err(|e| ReminderError::validation(format!("Invalid time pattern: {e}")))?;
    let too_far = || ReminderError::validation(format!("Relative time is too far ahead: {input}"));

    let mut minutes: i64 = 0;
    for caps in part.captures_iter(input) {
        let amount: i64 = caps[1].parse().map_err(|_| too_far())?;
        let unit = match &caps[2] {
            "m" => 1,
            "h" => 60,
            "d" => 60 * 24,
            _ => 60 * 24 * 7,
        };
        minutes = amount
            .checked_mul(unit)
            .and_then(|m| minutes.checked_add(m))
            .ok_or_else(too_far)?;
    }

    if minutes == 0 {
        return Err(ReminderError::validation("Relative time must be greater than zero"));
    }
    // Ten years is far beyond any sensible reminder
    if minutes > 60 * 24 * 3653 {
        return Err(too_far());
    }
    Ok(Some(Duration::minutes(minutes)))
}

fn next_day(date: NaiveDate) -> ReminderResult<NaiveDate> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| ReminderError::validation("Date out of range"))
}

/// The next instant at or after `now` that falls on `day` at local `time` in `tz`
fn next_weekday_at(
    day: DayOfWeek,
    time: NaiveTime,
    now: DateTime<Utc>,
    tz: Tz,
) -> ReminderResult<DateTime<Utc>> {
    let mut date = now.with_timezone(&tz).date_naive();
    for _ in 0..=7 {
        let candidate = calendar::resolve_local(tz, date.and_time(time));
        if calendar::day_of_week(candidate, tz) == day && candidate >= now {
            return Ok(candidate);
        }
        date = next_day(date)?;
    }
    Err(ReminderError::validation(format!("Cannot schedule on {day}")))
}
