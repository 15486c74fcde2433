//! Reminder records and their recurrence configuration
//!
//! - **Version**: 2.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 2.0.0: Fold the weekly day-of-week model into `Weekly` + allowed days
//! - 1.1.0: Add comments
//! - 1.0.0: Initial once/recurring model

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Day of week, numbered 0 (Sunday) through 6 (Saturday)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, DayOfWeek::Saturday | DayOfWeek::Sunday)
    }

    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Sun => DayOfWeek::Sunday,
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DayOfWeek {
    type Err = anyhow::Error;

    /// Accepts full or three-letter names in any case, or the index 0-6
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim().to_lowercase();
        if let Ok(index) = s.parse::<u8>() {
            return Self::from_index(index)
                .ok_or_else(|| anyhow::anyhow!("Invalid day index: {}", index));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|day| {
                let name = day.name().to_lowercase();
                s == name || s == name[..3]
            })
            .ok_or_else(|| anyhow::anyhow!("Invalid day of week: {}", s))
    }
}

/// Restricts which calendar days a recurring reminder may fire on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayFilter {
    pub skip_weekends: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_days: Option<BTreeSet<DayOfWeek>>,
}

impl DayFilter {
    pub fn weekdays_only() -> Self {
        Self {
            skip_weekends: true,
            allowed_days: None,
        }
    }

    pub fn only(days: impl IntoIterator<Item = DayOfWeek>) -> Self {
        Self {
            skip_weekends: false,
            allowed_days: Some(days.into_iter().collect()),
        }
    }

    /// Whether the given weekday passes this filter
    pub fn allows(&self, day: DayOfWeek) -> bool {
        if self.skip_weekends && day.is_weekend() {
            return false;
        }
        match &self.allowed_days {
            Some(days) => days.contains(&day),
            None => true,
        }
    }

    /// Whether any weekday at all passes this filter
    pub fn admits_any_day(&self) -> bool {
        DayOfWeek::ALL.iter().any(|d| self.allows(*d))
    }
}

/// How far each recurrence step moves `next_trigger_time`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum RecurrenceInterval {
    Daily,
    Weekly,
    Monthly,
    Custom { minutes: u32 },
}

impl RecurrenceInterval {
    /// Human label used in delivered messages
    pub fn label(&self) -> String {
        match self {
            RecurrenceInterval::Daily => "Daily reminder".to_string(),
            RecurrenceInterval::Weekly => "Weekly reminder".to_string(),
            RecurrenceInterval::Monthly => "Monthly reminder".to_string(),
            RecurrenceInterval::Custom { minutes: 1 } => "Every minute".to_string(),
            RecurrenceInterval::Custom { minutes } => format!("Every {minutes} minutes"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    pub interval: RecurrenceInterval,
    /// Completed fire-or-skip cycles
    #[serde(default)]
    pub occurrence_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurrences: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_filter: Option<DayFilter>,
}

impl Recurrence {
    pub fn new(interval: RecurrenceInterval) -> Self {
        Self {
            interval,
            occurrence_count: 0,
            max_occurrences: None,
            end_date: None,
            day_filter: None,
        }
    }

    pub fn with_max_occurrences(mut self, max: u32) -> Self {
        self.max_occurrences = Some(max);
        self
    }

    pub fn with_end_date(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    pub fn with_day_filter(mut self, filter: DayFilter) -> Self {
        self.day_filter = Some(filter);
        self
    }
}

/// Once or recurring; only recurring reminders carry recurrence state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReminderKind {
    Once,
    Recurring(Recurrence),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderComment {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    /// Unique reminder identifier
    pub id: String,

    /// User who owns the reminder
    pub user_id: String,

    /// Channel the reminder is delivered to
    pub channel_id: String,

    /// Guild where the reminder was created
    pub guild_id: String,

    pub title: String,

    pub message: String,

    /// When this reminder fires next
    pub next_trigger_time: DateTime<Utc>,

    /// Zone used for day filters and calendar arithmetic
    pub timezone: Tz,

    pub kind: ReminderKind,

    /// Inactive reminders are never selected by the scheduler
    pub is_active: bool,

    #[serde(default)]
    pub comments: Vec<ReminderComment>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    pub fn recurrence(&self) -> Option<&Recurrence> {
        match &self.kind {
            ReminderKind::Recurring(recurrence) => Some(recurrence),
            ReminderKind::Once => None,
        }
    }

    pub fn day_filter(&self) -> Option<&DayFilter> {
        self.recurrence().and_then(|r| r.day_filter.as_ref())
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self.kind, ReminderKind::Recurring(_))
    }

    /// Mark the record changed at `at`; `updated_at` never moves backwards
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Reminder {
        let at = Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap();
        Reminder {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            channel_id: "c1".to_string(),
            guild_id: "g1".to_string(),
            title: "Standup".to_string(),
            message: "Daily standup in 5".to_string(),
            next_trigger_time: at,
            timezone: chrono_tz::Asia::Tokyo,
            kind: ReminderKind::Recurring(
                Recurrence::new(RecurrenceInterval::Daily)
                    .with_max_occurrences(10)
                    .with_day_filter(DayFilter::weekdays_only()),
            ),
            is_active: true,
            comments: vec![],
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_day_of_week_parse() {
        assert_eq!("monday".parse::<DayOfWeek>().unwrap(), DayOfWeek::Monday);
        assert_eq!("Fri".parse::<DayOfWeek>().unwrap(), DayOfWeek::Friday);
        assert_eq!("0".parse::<DayOfWeek>().unwrap(), DayOfWeek::Sunday);
        assert!("7".parse::<DayOfWeek>().is_err());
        assert!("someday".parse::<DayOfWeek>().is_err());
    }

    #[test]
    fn test_day_of_week_from_chrono() {
        assert_eq!(DayOfWeek::from(Weekday::Sat), DayOfWeek::Saturday);
        assert_eq!(DayOfWeek::from(Weekday::Sun).index(), 0);
    }

    #[test]
    fn test_filter_allows() {
        let weekdays = DayFilter::weekdays_only();
        assert!(weekdays.allows(DayOfWeek::Monday));
        assert!(!weekdays.allows(DayOfWeek::Sunday));

        let tue_sat = DayFilter::only([DayOfWeek::Tuesday, DayOfWeek::Saturday]);
        assert!(tue_sat.allows(DayOfWeek::Saturday));
        assert!(!tue_sat.allows(DayOfWeek::Monday));
    }

    #[test]
    fn test_filter_admitting_nothing() {
        let mut filter = DayFilter::only([DayOfWeek::Saturday, DayOfWeek::Sunday]);
        assert!(filter.admits_any_day());
        filter.skip_weekends = true;
        assert!(!filter.admits_any_day());
        assert!(!DayFilter::only([]).admits_any_day());
    }

    #[test]
    fn test_interval_label() {
        assert_eq!(RecurrenceInterval::Daily.label(), "Daily reminder");
        assert_eq!(
            RecurrenceInterval::Custom { minutes: 90 }.label(),
            "Every 90 minutes"
        );
    }

    #[test]
    fn test_serde_shape() {
        let reminder = sample();
        let json = serde_json::to_value(&reminder).unwrap();
        assert_eq!(json["kind"]["type"], "recurring");
        assert_eq!(json["kind"]["interval"]["unit"], "daily");
        assert_eq!(json["kind"]["dayFilter"]["skipWeekends"], true);
        assert_eq!(json["timezone"], "Asia/Tokyo");
        assert_eq!(json["isActive"], true);

        let back: Reminder = serde_json::from_value(json).unwrap();
        assert_eq!(back, reminder);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut reminder = sample();
        let earlier = reminder.updated_at - chrono::Duration::hours(1);
        reminder.touch(earlier);
        assert_eq!(reminder.updated_at, reminder.created_at);

        let later = reminder.updated_at + chrono::Duration::hours(1);
        reminder.touch(later);
        assert_eq!(reminder.updated_at, later);
    }
}
