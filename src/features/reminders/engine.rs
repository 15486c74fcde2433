//! # Trigger Engine
//!
//! Decides, for one reminder at one instant, whether it fires, is skipped by
//! its day filter, or is left alone, and computes the state it must be
//! persisted in afterwards. The engine never performs I/O; given the same
//! reminder and `now` it always returns the same result.
//!
//! - **Version**: 1.3.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.3.0: Reject intervals that do not advance the trigger time
//! - 1.2.0: Filtered days consume an occurrence and re-check deactivation
//! - 1.1.0: Configurable probe budget
//! - 1.0.0: Initial once/recurring state machine

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

use super::calendar::{self, DEFAULT_PROBE_BUDGET};
use super::model::{DayFilter, Reminder, ReminderKind};
use crate::core::{ReminderError, ReminderResult};

/// Where a reminder stands relative to a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    /// Active and not yet due
    Scheduled,
    /// Active, due, and today passes its day filter
    Due,
    /// Active and due, but today is rejected by its day filter
    Filtered,
    /// Inactive; never touched by the engine again
    Deactivated,
}

/// What the scheduler must do with a due reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Deliver the reminder as it is now, then persist `next`
    Fire { next: Reminder },
    /// Deliver nothing, persist `next`
    Skip { next: Reminder },
}

impl Transition {
    pub fn next(&self) -> &Reminder {
        match self {
            Transition::Fire { next } | Transition::Skip { next } => next,
        }
    }

    pub fn into_next(self) -> Reminder {
        match self {
            Transition::Fire { next } | Transition::Skip { next } => next,
        }
    }

    pub fn is_fire(&self) -> bool {
        matches!(self, Transition::Fire { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TriggerEngine {
    probe_budget: u32,
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_BUDGET)
    }
}

impl TriggerEngine {
    pub fn new(probe_budget: u32) -> Self {
        Self {
            probe_budget: probe_budget.max(1),
        }
    }

    pub fn probe_budget(&self) -> u32 {
        self.probe_budget
    }

    /// Due when `next_trigger_time` has passed or falls in the same minute as `now`
    pub fn is_due(&self, reminder: &Reminder, now: DateTime<Utc>) -> bool {
        if !reminder.is_active {
            return false;
        }
        let trigger_minute = reminder
            .next_trigger_time
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(reminder.next_trigger_time);
        trigger_minute <= now
    }

    pub fn state(&self, reminder: &Reminder, now: DateTime<Utc>) -> TriggerState {
        if !reminder.is_active {
            TriggerState::Deactivated
        } else if !self.is_due(reminder, now) {
            TriggerState::Scheduled
        } else if calendar::matches_day_filter(now, reminder.timezone, reminder.day_filter()) {
            TriggerState::Due
        } else {
            TriggerState::Filtered
        }
    }

    /// The active reminders from `reminders` that are due at `now`
    pub fn due<'a>(&self, reminders: &'a [Reminder], now: DateTime<Utc>) -> Vec<&'a Reminder> {
        reminders
            .iter()
            .filter(|r| self.is_due(r, now))
            .collect()
    }

    /// Classify a reminder and compute its post-cycle state
    ///
    /// Returns `Ok(None)` when there is nothing to do. A day filter that admits
    /// no day yields `NoLegalDay` and an interval that does not advance yields
    /// `StalledInterval`; in both cases the caller must leave the stored
    /// reminder untouched.
    pub fn evaluate(
        &self,
        reminder: &Reminder,
        now: DateTime<Utc>,
    ) -> ReminderResult<Option<Transition>> {
        match self.state(reminder, now) {
            TriggerState::Scheduled | TriggerState::Deactivated => Ok(None),
            TriggerState::Due => Ok(Some(Transition::Fire {
                next: self.after_fire(reminder, now)?,
            })),
            TriggerState::Filtered => Ok(Some(Transition::Skip {
                next: self.after_skip(reminder, now)?,
            })),
        }
    }

    /// State after a delivered occurrence: once reminders deactivate,
    /// recurring ones advance
    pub fn after_fire(&self, reminder: &Reminder, now: DateTime<Utc>) -> ReminderResult<Reminder> {
        match reminder.kind {
            ReminderKind::Once => {
                let mut next = reminder.clone();
                next.is_active = false;
                next.touch(now);
                Ok(next)
            }
            ReminderKind::Recurring(_) => self.advance_recurrence(reminder, now),
        }
    }

    /// State after a filtered-out day; the skipped day still counts as an occurrence
    pub fn after_skip(&self, reminder: &Reminder, now: DateTime<Utc>) -> ReminderResult<Reminder> {
        match reminder.kind {
            // Once reminders carry no filter
            ReminderKind::Once => Ok(reminder.clone()),
            ReminderKind::Recurring(_) => self.advance_recurrence(reminder, now),
        }
    }

    /// Snap an instant forward onto the first day the filter allows
    pub fn align(
        &self,
        instant: DateTime<Utc>,
        tz: Tz,
        filter: Option<&DayFilter>,
    ) -> ReminderResult<DateTime<Utc>> {
        calendar::next_legal_day(instant, tz, filter, self.probe_budget)
    }

    fn advance_recurrence(&self, reminder: &Reminder, now: DateTime<Utc>) -> ReminderResult<Reminder> {
        let mut next = reminder.clone();

        let (deactivate, next_trigger) = match &mut next.kind {
            ReminderKind::Recurring(recurrence) => {
                recurrence.occurrence_count = recurrence.occurrence_count.saturating_add(1);

                let reached_max = recurrence
                    .max_occurrences
                    .is_some_and(|max| recurrence.occurrence_count >= max);
                let past_end = recurrence.end_date.is_some_and(|end| now > end);

                if reached_max || past_end {
                    (true, None)
                } else {
                    let stepped = calendar::advance(
                        reminder.next_trigger_time,
                        reminder.timezone,
                        &recurrence.interval,
                    );
                    // A zero-minute interval would leave the reminder due on every tick
                    if stepped <= reminder.next_trigger_time {
                        return Err(ReminderError::stalled_interval(recurrence.interval.label()));
                    }
                    let aligned = self.align(
                        stepped,
                        reminder.timezone,
                        recurrence.day_filter.as_ref(),
                    )?;
                    (false, Some(aligned))
                }
            }
            ReminderKind::Once => (true, None),
        };

        if deactivate {
            next.is_active = false;
        }
        if let Some(at) = next_trigger {
            next.next_trigger_time = at;
        }
        next.touch(now);
        Ok(next)
    }
}
