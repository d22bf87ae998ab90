//! Booking operations and the read models the HTTP layer renders.
//!
//! Read views join live slots with reservations. A reservation whose slot is
//! not in the date's live set is left out of every slot's user list; the row
//! itself stays in the store and shows up again if the slot returns.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::cutover::{CutoverRecord, last_cutover};
use crate::date_key::{DateKey, days_from};
use crate::error::Result;
use crate::policy::SlotLabel;
use crate::store::Database;
use crate::store::pending::{self, PendingChange};
use crate::store::schedule::{
    self, Reservation, get_reservations, get_slots, list_all_reservations, list_all_slots,
};

/// Days a user may book ahead, today included.
pub const DEFAULT_BOOKING_WINDOW_DAYS: u32 = 14;

/// A name shown under a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookedUser {
    pub name: String,
    pub band_name: String,
}

/// One live slot and who booked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub label: SlotLabel,
    pub users_booked: Vec<BookedUser>,
}

/// Everything a booking page needs for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateView {
    pub date_key: DateKey,
    pub slots: Vec<SlotView>,
}

/// Save a reservation, replacing any earlier one by the same user that day.
///
/// # Errors
///
/// Returns a validation error for blank fields, or a store error.
pub fn submit_reservation(
    db: &Database,
    date_key: &DateKey,
    user_name: &str,
    band_name: &str,
    time_slot: &str,
) -> Result<Reservation> {
    db.write(|tx| schedule::upsert_reservation(tx, date_key, user_name, band_name, time_slot))
}

/// Stage an admin edit for `date_key`. The live set is untouched until the
/// next cutover; an empty list stages a clear.
///
/// # Errors
///
/// Returns a store error.
pub fn stage_slot_change<S: AsRef<str>>(
    db: &Database,
    date_key: &DateKey,
    labels: &[S],
) -> Result<PendingChange> {
    db.write(|tx| pending::stage(tx, date_key, labels))
}

/// Live slots of `date_key` with the users booked into each.
///
/// # Errors
///
/// Returns a store error. Never substitutes an empty view for a failure.
pub fn query_date_view(db: &Database, date_key: &DateKey) -> Result<DateView> {
    let (slots, reservations) = db.read(|conn| {
        Ok((get_slots(conn, date_key)?, get_reservations(conn, date_key)?))
    })?;
    Ok(DateView {
        date_key: *date_key,
        slots: group_by_slot(&slots, &reservations),
    })
}

/// Place reservations under their live slot, in reservation order. Bookings
/// for slots not in `slots` are dropped from the view.
#[must_use]
pub fn group_by_slot(slots: &[SlotLabel], reservations: &[Reservation]) -> Vec<SlotView> {
    slots
        .iter()
        .map(|label| SlotView {
            label: label.clone(),
            users_booked: reservations
                .iter()
                .filter(|reservation| &reservation.time_slot == label)
                .map(|reservation| BookedUser {
                    name: reservation.user_name.clone(),
                    band_name: reservation.band_name.clone(),
                })
                .collect(),
        })
        .collect()
}

/// One day of the admin page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminDay {
    pub date_key: DateKey,
    pub weekday: String,
    pub slots: Vec<SlotView>,
    pub pending: PendingChange,
}

/// The admin page: live schedule with bookings, staged edits, last cutover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminOverview {
    pub days: Vec<AdminDay>,
    pub last_cutover: Option<CutoverRecord>,
}

/// Build the admin view for `dates` from whole-table listings in one snapshot.
///
/// # Errors
///
/// Returns a store error.
pub fn admin_overview(db: &Database, dates: &[NaiveDate]) -> Result<AdminOverview> {
    let (slot_rows, reservation_rows, mut staged, last) = db.read(|conn| {
        Ok((
            list_all_slots(conn)?,
            list_all_reservations(conn)?,
            pending::get_all(conn)?,
            last_cutover(conn)?,
        ))
    })?;

    let mut slots_by_date: HashMap<DateKey, Vec<SlotLabel>> = HashMap::new();
    for row in slot_rows {
        slots_by_date.entry(row.date_key).or_default().push(row.label);
    }

    let mut reservations_by_date: HashMap<DateKey, Vec<Reservation>> = HashMap::new();
    for row in reservation_rows {
        reservations_by_date
            .entry(row.date_key)
            .or_default()
            .push(Reservation {
                user_name: row.user_name,
                band_name: row.band_name,
                time_slot: row.time_slot,
            });
    }

    let days = dates
        .iter()
        .map(|date| {
            let date_key = DateKey::from_date(*date);
            let slots = slots_by_date.get(&date_key).map_or(&[][..], Vec::as_slice);
            let reservations = reservations_by_date
                .get(&date_key)
                .map_or(&[][..], Vec::as_slice);
            AdminDay {
                date_key,
                weekday: date.weekday().to_string(),
                slots: group_by_slot(slots, reservations),
                pending: staged.remove(&date_key).unwrap_or(PendingChange::NoChange),
            }
        })
        .collect();

    Ok(AdminOverview {
        days,
        last_cutover: last,
    })
}

/// A month the calendar page should draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
}

/// Dates open for booking and the months needed to show them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingWindow {
    pub today: DateKey,
    pub dates: Vec<DateKey>,
    pub months: Vec<MonthView>,
}

/// The `days`-long booking window starting today. The next month is added to
/// the calendar once fewer than seven days of the current month remain.
#[must_use]
pub fn booking_window(today: NaiveDate, days: u32) -> BookingWindow {
    let dates = days_from(today, days)
        .into_iter()
        .map(DateKey::from_date)
        .collect();

    let mut months = vec![MonthView {
        year: today.year(),
        month: today.month(),
    }];
    let next_month = first_of_next_month(today);
    let days_left = (next_month - Duration::days(1)).day() - today.day();
    if days_left < 7 {
        months.push(MonthView {
            year: next_month.year(),
            month: next_month.month(),
        });
    }

    BookingWindow {
        today: DateKey::from_date(today),
        dates,
        months,
    }
}

fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
}
