//! Calendar-day classification of reminders.
//!
//! Every function here is a pure read over the slice it is given. A reminder
//! belongs to the day of its completion once done, else to the day it was
//! created (see [`Reminder::bucket_day`]).

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Weekday};
use shared::domain::Reminder;

/// Reminders sharing one bucket day, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub day: NaiveDate,
    pub reminders: Vec<Reminder>,
}

impl DayGroup {
    pub fn completed_count(&self) -> usize {
        self.reminders.iter().filter(|r| r.is_done()).count()
    }

    pub fn total_count(&self) -> usize {
        self.reminders.len()
    }

    pub fn completion_ratio(&self) -> f64 {
        if self.reminders.is_empty() {
            return 0.0;
        }
        self.completed_count() as f64 / self.total_count() as f64
    }

    pub fn progress(&self) -> DayProgress {
        DayProgress::from_counts(self.completed_count(), self.total_count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayProgress {
    /// Less than half done.
    Starting,
    /// At least half done, not all.
    InProgress,
    Complete,
}

impl DayProgress {
    pub fn from_counts(completed: usize, total: usize) -> Self {
        if total > 0 && completed >= total {
            Self::Complete
        } else if total > 0 && completed * 2 >= total {
            Self::InProgress
        } else {
            Self::Starting
        }
    }
}

/// Groups by bucket day, most recent day first. Days without reminders are
/// never produced.
pub fn grouped_by_day<Tz: TimeZone>(reminders: &[Reminder], tz: &Tz) -> Vec<DayGroup> {
    let mut by_day: BTreeMap<NaiveDate, Vec<Reminder>> = BTreeMap::new();
    for reminder in reminders {
        by_day
            .entry(reminder.bucket_day(tz))
            .or_default()
            .push(reminder.clone());
    }

    by_day
        .into_iter()
        .rev()
        .map(|(day, reminders)| DayGroup { day, reminders })
        .collect()
}

pub fn on_day<Tz: TimeZone>(reminders: &[Reminder], day: NaiveDate, tz: &Tz) -> Vec<Reminder> {
    reminders
        .iter()
        .filter(|r| r.bucket_day(tz) == day)
        .cloned()
        .collect()
}

pub fn due_today<Tz: TimeZone>(reminders: &[Reminder], now: &DateTime<Tz>) -> Vec<Reminder> {
    on_day(reminders, now.date_naive(), &now.timezone())
}

/// Unfinished reminders whose bucket day is before today.
pub fn overdue<Tz: TimeZone>(reminders: &[Reminder], now: &DateTime<Tz>) -> Vec<Reminder> {
    let today = now.date_naive();
    let tz = now.timezone();
    reminders
        .iter()
        .filter(|r| !r.is_done() && r.bucket_day(&tz) < today)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    Today,
    Yesterday,
    Weekday(Weekday),
}

pub fn day_label(day: NaiveDate, today: NaiveDate) -> DayLabel {
    if day == today {
        DayLabel::Today
    } else if today.checked_sub_days(Days::new(1)) == Some(day) {
        DayLabel::Yesterday
    } else {
        DayLabel::Weekday(day.weekday())
    }
}

/// Monday..Sunday of the week `day` falls in.
pub fn week_containing(day: NaiveDate) -> [NaiveDate; 7] {
    let monday = day.week(Weekday::Mon).first_day();
    std::array::from_fn(|offset| monday + Days::new(offset as u64))
}

/// Whether the week starting at `week_start` lies before the current week,
/// i.e. whether paging forward can still reach today.
pub fn can_advance_week(week_start: NaiveDate, today: NaiveDate) -> bool {
    week_start < today.week(Weekday::Mon).first_day()
}

#[cfg(test)]
#[path = "tests/bucketing_tests.rs"]
mod tests;
