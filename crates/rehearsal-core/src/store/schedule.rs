//! Live slot sets and reservations.
//!
//! A date is either absent from `slot_dates` (never seeded) or present with
//! zero or more ordered labels. [`get_slots`] never falls back to the
//! default policy: absent and empty both read as an empty list, and
//! [`has_slot_entry`] tells them apart.

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;

use super::now_us;
use crate::date_key::DateKey;
use crate::error::{Error, ErrorCode, Result, StoreContext};
use crate::policy::{SlotLabel, normalize_labels};

/// One user's booking for a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub user_name: String,
    pub band_name: String,
    pub time_slot: SlotLabel,
}

/// A reservation row from the whole-calendar listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationRow {
    pub date_key: DateKey,
    pub user_name: String,
    pub time_slot: SlotLabel,
    pub band_name: String,
}

/// A live slot row from the whole-calendar listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRow {
    pub date_key: DateKey,
    pub label: SlotLabel,
}

/// Live labels for `date_key` in display order. Empty when none are recorded.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_slots(conn: &Connection, date_key: &DateKey) -> Result<Vec<SlotLabel>> {
    let mut stmt = conn
        .prepare_cached("SELECT label FROM time_slots WHERE date_key = ?1 ORDER BY position")
        .store_context("prepare get_slots")?;
    let rows = stmt
        .query_map([date_key], |row| row.get::<_, String>(0))
        .store_context("query get_slots")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .store_context("read get_slots rows")
}

/// Whether `date_key` has a live slot set at all, even an empty one.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn has_slot_entry(conn: &Connection, date_key: &DateKey) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM slot_dates WHERE date_key = ?1",
        [date_key],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .store_context("query has_slot_entry")
}

/// Replace the whole live set for `date_key`. Labels are trimmed, blanks are
/// dropped, and repeats keep their first position. Returns what was stored.
///
/// # Errors
///
/// Returns an error if any statement fails; the caller's transaction should
/// then be rolled back.
pub fn set_slots<S: AsRef<str>>(
    tx: &Transaction<'_>,
    date_key: &DateKey,
    labels: &[S],
) -> Result<Vec<SlotLabel>> {
    let labels = normalize_labels(labels);

    tx.execute(
        "INSERT INTO slot_dates (date_key, updated_at_us) VALUES (?1, ?2)
         ON CONFLICT(date_key) DO UPDATE SET updated_at_us = excluded.updated_at_us",
        params![date_key, now_us()],
    )
    .store_context("upsert slot date")?;
    tx.execute("DELETE FROM time_slots WHERE date_key = ?1", [date_key])
        .store_context("clear live slots")?;

    let mut insert = tx
        .prepare_cached("INSERT INTO time_slots (date_key, position, label) VALUES (?1, ?2, ?3)")
        .store_context("prepare slot insert")?;
    for (position, label) in labels.iter().enumerate() {
        insert
            .execute(params![date_key, i64::try_from(position).unwrap_or(i64::MAX), label])
            .store_context("insert live slot")?;
    }

    tracing::debug!(%date_key, count = labels.len(), "replaced live slots");
    Ok(labels)
}

/// Reservations for `date_key` in first-submission order. Unique by user.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_reservations(conn: &Connection, date_key: &DateKey) -> Result<Vec<Reservation>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT user_name, band_name, time_slot FROM reservations
             WHERE date_key = ?1
             ORDER BY created_at_us, rowid",
        )
        .store_context("prepare get_reservations")?;
    let rows = stmt
        .query_map([date_key], |row| {
            Ok(Reservation {
                user_name: row.get(0)?,
                band_name: row.get(1)?,
                time_slot: row.get(2)?,
            })
        })
        .store_context("query get_reservations")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .store_context("read reservation rows")
}

/// Insert or overwrite the reservation of `user_name` on `date_key`.
///
/// All three fields are required after trimming. The slot is not checked
/// against the live set; a booking for a slot that is later removed stays in
/// the table and is hidden by the read views instead.
///
/// # Errors
///
/// Returns [`Error::Validation`] when a field is blank, or a store error.
pub fn upsert_reservation(
    tx: &Transaction<'_>,
    date_key: &DateKey,
    user_name: &str,
    band_name: &str,
    time_slot: &str,
) -> Result<Reservation> {
    let reservation = validate_reservation(user_name, band_name, time_slot)?;
    let now = now_us();

    tx.execute(
        "INSERT INTO reservations (
            date_key, user_name, band_name, time_slot, created_at_us, updated_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(date_key, user_name) DO UPDATE SET
            band_name = excluded.band_name,
            time_slot = excluded.time_slot,
            updated_at_us = excluded.updated_at_us",
        params![
            date_key,
            reservation.user_name,
            reservation.band_name,
            reservation.time_slot,
            now
        ],
    )
    .store_context("upsert reservation")?;

    tracing::info!(
        %date_key,
        user = %reservation.user_name,
        slot = %reservation.time_slot,
        "reservation saved"
    );
    Ok(reservation)
}

fn validate_reservation(user_name: &str, band_name: &str, time_slot: &str) -> Result<Reservation> {
    let user_name = user_name.trim();
    let band_name = band_name.trim();
    let time_slot = time_slot.trim();

    let missing: Vec<&str> = [
        ("user name", user_name),
        ("band name", band_name),
        ("time slot", time_slot),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(field, _)| field)
    .collect();

    if !missing.is_empty() {
        return Err(Error::validation(
            ErrorCode::MissingBookingField,
            format!("missing required field(s): {}", missing.join(", ")),
        ));
    }

    Ok(Reservation {
        user_name: user_name.to_string(),
        band_name: band_name.to_string(),
        time_slot: time_slot.to_string(),
    })
}

/// Every reservation across all dates, in calendar order then submission order.
///
/// # Errors
///
/// Returns an error if the query fails or a stored key is unreadable.
pub fn list_all_reservations(conn: &Connection) -> Result<Vec<ReservationRow>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT date_key, user_name, time_slot, band_name FROM reservations
             ORDER BY date_key, created_at_us, rowid",
        )
        .store_context("prepare list_all_reservations")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ReservationRow {
                date_key: row.get(0)?,
                user_name: row.get(1)?,
                time_slot: row.get(2)?,
                band_name: row.get(3)?,
            })
        })
        .store_context("query list_all_reservations")?;
    let mut listing = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .store_context("read reservation listing")?;
    // Text order puts 2024-10-1 before 2024-9-30; the stable sort keeps
    // submission order within a date.
    listing.sort_by_key(|row| row.date_key);
    Ok(listing)
}

/// Every live slot across all dates, in calendar order then display order.
///
/// # Errors
///
/// Returns an error if the query fails or a stored key is unreadable.
pub fn list_all_slots(conn: &Connection) -> Result<Vec<SlotRow>> {
    let mut stmt = conn
        .prepare_cached("SELECT date_key, label FROM time_slots ORDER BY date_key, position")
        .store_context("prepare list_all_slots")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SlotRow {
                date_key: row.get(0)?,
                label: row.get(1)?,
            })
        })
        .store_context("query list_all_slots")?;
    let mut listing = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .store_context("read slot listing")?;
    listing.sort_by_key(|row| row.date_key);
    Ok(listing)
}
