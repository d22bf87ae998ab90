//! Wall-clock access and the weekly cutover instant.
//!
//! The timer loop itself lives in the binary. This module only answers
//! "when is the next cutover after `now`?", which keeps the engine testable
//! without waiting on real time.

use std::fmt;
use std::sync::Mutex;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// The process's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    #[must_use]
    pub const fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Midday on `date`.
    #[must_use]
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(NaiveTime::MIN + Duration::hours(12)))
    }

    pub fn set(&self, now: NaiveDateTime) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    pub fn advance(&self, by: Duration) {
        let next = self.now() + by;
        self.set(next);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// A recurring instant: one weekday at one local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl Default for WeeklySchedule {
    /// Sunday 19:00.
    fn default() -> Self {
        Self {
            weekday: Weekday::Sun,
            time: NaiveTime::MIN + Duration::hours(19),
        }
    }
}

impl WeeklySchedule {
    #[must_use]
    pub const fn new(weekday: Weekday, time: NaiveTime) -> Self {
        Self { weekday, time }
    }

    /// The first firing strictly after `now`. A firing exactly at `now` is
    /// considered already taken, so calling this right after a firing yields
    /// the following week.
    #[must_use]
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        let target = self.weekday.num_days_from_sunday();
        let current = today.weekday().num_days_from_sunday();
        let days_ahead = (7 + target - current) % 7;

        let candidate = (today + Duration::days(i64::from(days_ahead))).and_time(self.time);
        if candidate > now {
            candidate
        } else {
            candidate + Duration::days(7)
        }
    }

    /// Next firing after `now` and how long to sleep until it.
    #[must_use]
    pub fn wait_from(&self, now: NaiveDateTime) -> (NaiveDateTime, std::time::Duration) {
        let next = self.next_after(now);
        let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
        (next, wait)
    }
}

impl fmt::Display for WeeklySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} at {}", self.weekday, self.time.format("%H:%M"))
    }
}
