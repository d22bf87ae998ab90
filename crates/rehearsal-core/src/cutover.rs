//! Weekly cutover: promote staged slot sets and seed the newly visible week.
//!
//! A cutover is one IMMEDIATE transaction:
//!
//! 1. **Promote**: every staged date gets its live set replaced (`Clear`
//!    empties it), then the whole pending table is emptied.
//! 2. **Seed**: each day of the week starting three weeks after the current
//!    week's Sunday receives the default slots, but only if the date has no
//!    live entry at all. A date explicitly cleared earlier keeps its empty set.
//! 3. The cutover is recorded in `calendar_meta`.
//!
//! If any step fails the transaction rolls back and the caller gets
//! [`Error::CutoverFailure`]; staged changes then remain staged.
//!
//! Because the promote step runs under the same write lock as the pending
//! table read, two cutovers racing each other serialize: the second sees an
//! empty pending set and only performs its own seeding.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;

use crate::date_key::{DateKey, days_from, week_start};
use crate::error::{Error, Result, StoreContext};
use crate::policy::default_slots;
use crate::schedule::Clock;
use crate::store::Database;
use crate::store::pending::{self, PendingChange};
use crate::store::schedule::{has_slot_entry, set_slots};

/// Weeks between the current week and the week revealed at cutover.
pub const SEED_WEEKS_AHEAD: i64 = 3;

/// Length of the window filled by admin initialization, in days.
pub const INITIAL_WINDOW_DAYS: u32 = 21;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// What started a cutover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl Trigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "manual" => Ok(Self::Manual),
            other => Err(Error::Corrupt(format!("unknown cutover trigger '{other}'"))),
        }
    }
}

/// Outcome of one cutover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutoverReport {
    pub trigger: Trigger,
    pub applied_at: NaiveDateTime,
    /// Dates whose live set was replaced from a staged change.
    pub promoted: Vec<DateKey>,
    /// Dates that received default slots for the first time.
    pub seeded: Vec<DateKey>,
}

impl CutoverReport {
    /// Whether any staged change existed to promote.
    #[must_use]
    pub fn had_changes(&self) -> bool {
        !self.promoted.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> String {
        if self.had_changes() {
            format!(
                "applied {} staged change(s); seeded {} new date(s)",
                self.promoted.len(),
                self.seeded.len()
            )
        } else {
            format!(
                "no staged changes to apply; seeded {} new date(s)",
                self.seeded.len()
            )
        }
    }
}

/// The most recent cutover, as recorded in `calendar_meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutoverRecord {
    pub applied_at: NaiveDateTime,
    pub trigger: Trigger,
    pub promoted: u32,
    pub seeded: u32,
}

/// Runs cutovers and default seeding against a [`Database`].
#[derive(Clone)]
pub struct CutoverEngine {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CutoverEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CutoverEngine")
            .field("db", &self.db)
            .field("now", &self.clock.now())
            .finish()
    }
}

impl CutoverEngine {
    #[must_use]
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Promote every staged change and seed the upcoming week, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CutoverFailure`] wrapping the first store error; no
    /// part of the cutover is committed in that case.
    pub fn apply(&self, trigger: Trigger) -> Result<CutoverReport> {
        let now = self.clock.now();
        let report = self
            .db
            .write(|tx| apply_in(tx, now, trigger))
            .map_err(|err| {
                tracing::error!(%trigger, error = %err, "cutover rolled back");
                Error::cutover(err)
            })?;

        tracing::info!(
            %trigger,
            promoted = report.promoted.len(),
            seeded = report.seeded.len(),
            "cutover applied"
        );
        Ok(report)
    }

    /// Seed default slots for every date of the current three-week window
    /// that has no live entry yet. Returns the dates seeded.
    ///
    /// # Errors
    ///
    /// Returns a store error; nothing is committed in that case.
    pub fn initialize_default_slots(&self) -> Result<Vec<DateKey>> {
        let dates = current_window(self.clock.today());
        let seeded = self.db.write(|tx| seed_missing(tx, &dates))?;
        tracing::info!(seeded = seeded.len(), "initialized default slots");
        Ok(seeded)
    }

    /// The last recorded cutover, if one ever ran.
    ///
    /// # Errors
    ///
    /// Returns a store error or [`Error::Corrupt`] for unreadable metadata.
    pub fn last_cutover(&self) -> Result<Option<CutoverRecord>> {
        self.db.read(last_cutover)
    }
}

/// Both cutover phases plus bookkeeping, inside the caller's transaction.
///
/// # Errors
///
/// Returns the first store error encountered.
pub fn apply_in(
    tx: &Transaction<'_>,
    now: NaiveDateTime,
    trigger: Trigger,
) -> Result<CutoverReport> {
    let promoted = promote_pending(tx)?;
    let seeded = seed_missing(tx, &future_week(now.date()))?;
    record_cutover(tx, now, trigger, promoted.len(), seeded.len())?;

    Ok(CutoverReport {
        trigger,
        applied_at: now,
        promoted,
        seeded,
    })
}

/// Phase 1: replace live sets from staged changes, then empty the pending
/// table. Returns the promoted dates in calendar order.
///
/// # Errors
///
/// Returns the first store error encountered.
pub fn promote_pending(tx: &Transaction<'_>) -> Result<Vec<DateKey>> {
    let staged = pending::get_all(tx)?;
    let mut promoted = Vec::with_capacity(staged.len());

    for (date_key, change) in &staged {
        let Some(target) = change.target_slots() else {
            continue;
        };
        let stored = set_slots(tx, date_key, target)?;
        tracing::debug!(
            %date_key,
            cleared = matches!(change, PendingChange::Clear),
            slots = stored.len(),
            "promoted staged change"
        );
        promoted.push(*date_key);
    }

    pending::clear_all(tx)?;
    Ok(promoted)
}

/// Give each date with no live entry its default slots. Dates holding an
/// entry, including an empty one, are left alone.
///
/// # Errors
///
/// Returns the first store error encountered.
pub fn seed_missing(tx: &Transaction<'_>, dates: &[NaiveDate]) -> Result<Vec<DateKey>> {
    let mut seeded = Vec::new();
    for date in dates {
        let date_key = DateKey::from_date(*date);
        if has_slot_entry(tx, &date_key)? {
            continue;
        }
        set_slots(tx, &date_key, &default_slots(*date))?;
        seeded.push(date_key);
    }
    Ok(seeded)
}

/// Phase 2 window: seven days from the Sunday three weeks after the Sunday
/// that starts `today`'s week.
#[must_use]
pub fn future_week(today: NaiveDate) -> Vec<NaiveDate> {
    let start = week_start(today) + Duration::weeks(SEED_WEEKS_AHEAD);
    days_from(start, 7)
}

/// Admin initialization window: three weeks starting at the Sunday that
/// starts `today`'s week. Ends the day before [`future_week`] begins.
#[must_use]
pub fn current_window(today: NaiveDate) -> Vec<NaiveDate> {
    days_from(week_start(today), INITIAL_WINDOW_DAYS)
}

fn record_cutover(
    tx: &Transaction<'_>,
    now: NaiveDateTime,
    trigger: Trigger,
    promoted: usize,
    seeded: usize,
) -> Result<()> {
    tx.execute(
        "UPDATE calendar_meta
         SET last_cutover_at = ?1,
             last_cutover_trigger = ?2,
             last_cutover_promoted = ?3,
             last_cutover_seeded = ?4
         WHERE id = 1",
        params![
            now.format(TIMESTAMP_FORMAT).to_string(),
            trigger.as_str(),
            i64::try_from(promoted).unwrap_or(i64::MAX),
            i64::try_from(seeded).unwrap_or(i64::MAX),
        ],
    )
    .store_context("record cutover")?;
    Ok(())
}

/// Read the last cutover from `calendar_meta`.
///
/// # Errors
///
/// Returns a store error or [`Error::Corrupt`] for unreadable metadata.
pub fn last_cutover(conn: &Connection) -> Result<Option<CutoverRecord>> {
    let row = conn
        .query_row(
            "SELECT last_cutover_at, last_cutover_trigger, last_cutover_promoted, last_cutover_seeded
             FROM calendar_meta
             WHERE id = 1 AND last_cutover_at IS NOT NULL",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                ))
            },
        )
        .optional()
        .store_context("query last cutover")?;

    let Some((applied_at, trigger, promoted, seeded)) = row else {
        return Ok(None);
    };

    let applied_at = NaiveDateTime::parse_from_str(&applied_at, TIMESTAMP_FORMAT)
        .map_err(|err| Error::Corrupt(format!("bad cutover timestamp '{applied_at}': {err}")))?;
    Ok(Some(CutoverRecord {
        applied_at,
        trigger: trigger.parse()?,
        promoted,
        seeded,
    }))
}
