//! Staged slot sets awaiting the next cutover.
//!
//! A date holds at most one staged entry. Staging an empty list stores
//! [`PendingChange::Clear`], which is not the same as having nothing staged:
//! at cutover `Clear` empties the date's live set while an unstaged date is
//! left alone.

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;

use super::now_us;
use crate::date_key::DateKey;
use crate::error::{Error, Result, StoreContext};
use crate::policy::{SlotLabel, normalize_labels};

const ACTION_CLEAR: &str = "clear";
const ACTION_REPLACE: &str = "replace";

/// What the next cutover will do to one date's live slot set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "slots", rename_all = "snake_case")]
pub enum PendingChange {
    /// Nothing staged; the date is untouched at cutover.
    NoChange,
    /// Staged empty; the date's live set becomes empty at cutover.
    Clear,
    /// The date's live set becomes exactly this list at cutover.
    Replace(Vec<SlotLabel>),
}

impl PendingChange {
    /// Build the staged form of an admin-submitted list.
    #[must_use]
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let labels = normalize_labels(labels);
        if labels.is_empty() {
            Self::Clear
        } else {
            Self::Replace(labels)
        }
    }

    #[must_use]
    pub const fn is_staged(&self) -> bool {
        !matches!(self, Self::NoChange)
    }

    /// Labels the live set will hold after cutover, if anything is staged.
    #[must_use]
    pub fn target_slots(&self) -> Option<&[SlotLabel]> {
        match self {
            Self::NoChange => None,
            Self::Clear => Some(&[]),
            Self::Replace(labels) => Some(labels),
        }
    }
}

/// Stage `labels` for `date_key`, replacing whatever was staged before.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn stage<S: AsRef<str>>(
    tx: &Transaction<'_>,
    date_key: &DateKey,
    labels: &[S],
) -> Result<PendingChange> {
    let change = PendingChange::from_labels(labels);

    tx.execute("DELETE FROM pending_changes WHERE date_key = ?1", [date_key])
        .store_context("drop previous staged change")?;

    let action = match change {
        PendingChange::Replace(_) => ACTION_REPLACE,
        PendingChange::Clear | PendingChange::NoChange => ACTION_CLEAR,
    };
    tx.execute(
        "INSERT INTO pending_changes (date_key, action, staged_at_us) VALUES (?1, ?2, ?3)",
        params![date_key, action, now_us()],
    )
    .store_context("insert staged change")?;

    if let PendingChange::Replace(labels) = &change {
        let mut insert = tx
            .prepare_cached(
                "INSERT INTO pending_slots (date_key, position, label) VALUES (?1, ?2, ?3)",
            )
            .store_context("prepare staged slot insert")?;
        for (position, label) in labels.iter().enumerate() {
            insert
                .execute(params![date_key, i64::try_from(position).unwrap_or(i64::MAX), label])
                .store_context("insert staged slot")?;
        }
    }

    tracing::info!(%date_key, action, "staged slot change");
    Ok(change)
}

/// The staged change for one date, or [`PendingChange::NoChange`].
///
/// # Errors
///
/// Returns an error if the query fails or the stored action is unknown.
pub fn get(conn: &Connection, date_key: &DateKey) -> Result<PendingChange> {
    let action: Option<String> = conn
        .query_row(
            "SELECT action FROM pending_changes WHERE date_key = ?1",
            [date_key],
            |row| row.get(0),
        )
        .optional()
        .store_context("query staged change")?;

    match action.as_deref() {
        None => Ok(PendingChange::NoChange),
        Some(ACTION_CLEAR) => Ok(PendingChange::Clear),
        Some(ACTION_REPLACE) => {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT label FROM pending_slots WHERE date_key = ?1 ORDER BY position",
                )
                .store_context("prepare staged slots")?;
            let labels = stmt
                .query_map([date_key], |row| row.get::<_, String>(0))
                .store_context("query staged slots")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .store_context("read staged slots")?;
            Ok(PendingChange::Replace(labels))
        }
        Some(other) => Err(Error::Corrupt(format!(
            "unknown staged action '{other}' for {date_key}"
        ))),
    }
}

/// Every staged change, keyed and ordered by calendar date. Never contains
/// [`PendingChange::NoChange`].
///
/// # Errors
///
/// Returns an error if the query fails or a stored row is unreadable.
pub fn get_all(conn: &Connection) -> Result<BTreeMap<DateKey, PendingChange>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT c.date_key, c.action, s.label
             FROM pending_changes c
             LEFT JOIN pending_slots s ON s.date_key = c.date_key
             ORDER BY c.date_key, s.position",
        )
        .store_context("prepare staged listing")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, DateKey>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .store_context("query staged listing")?;

    let mut staged = BTreeMap::new();
    for row in rows {
        let (date_key, action, label) = row.store_context("read staged row")?;
        let entry = staged.entry(date_key);
        match action.as_str() {
            ACTION_CLEAR => {
                entry.or_insert(PendingChange::Clear);
            }
            ACTION_REPLACE => {
                let change = entry.or_insert_with(|| PendingChange::Replace(Vec::new()));
                if let (PendingChange::Replace(labels), Some(label)) = (change, label) {
                    labels.push(label);
                }
            }
            other => {
                return Err(Error::Corrupt(format!(
                    "unknown staged action '{other}' for {date_key}"
                )));
            }
        }
    }
    Ok(staged)
}

/// Delete every staged change. Returns how many dates were cleared.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn clear_all(tx: &Transaction<'_>) -> Result<usize> {
    let cleared = tx
        .execute("DELETE FROM pending_changes", [])
        .store_context("clear staged changes")?;
    tracing::debug!(cleared, "cleared staged changes");
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;

    fn key(raw: &str) -> DateKey {
        DateKey::parse_wire(raw).expect("valid key")
    }

    #[test]
    fn empty_list_stages_clear() {
        let db = Database::open_in_memory().expect("open");
        let date = key("2024-06-10");
        let change = db.write(|tx| stage::<&str>(tx, &date, &[])).expect("stage");
        assert_eq!(change, PendingChange::Clear);
        assert_eq!(db.read(|conn| get(conn, &date)).expect("get"), PendingChange::Clear);
    }

    #[test]
    fn blank_only_list_stages_clear() {
        assert_eq!(PendingChange::from_labels(&["  ", ""]), PendingChange::Clear);
    }

    #[test]
    fn unstaged_date_reports_no_change() {
        let db = Database::open_in_memory().expect("open");
        let change = db.read(|conn| get(conn, &key("2024-06-10"))).expect("get");
        assert_eq!(change, PendingChange::NoChange);
        assert!(!change.is_staged());
        assert_eq!(change.target_slots(), None);
    }

    #[test]
    fn restaging_replaces_previous_entry() {
        let db = Database::open_in_memory().expect("open");
        let date = key("2024-06-10");
        db.write(|tx| stage(tx, &date, &["a", "b"])).expect("first");
        db.write(|tx| stage(tx, &date, &["c"])).expect("second");
        assert_eq!(
            db.read(|conn| get(conn, &date)).expect("get"),
            PendingChange::Replace(vec!["c".into()])
        );

        db.write(|tx| stage::<&str>(tx, &date, &[])).expect("third");
        let all = db.read(get_all).expect("all");
        assert_eq!(all.len(), 1);
        assert_eq!(all.get(&date), Some(&PendingChange::Clear));
    }

    #[test]
    fn get_all_orders_by_calendar_date_and_keeps_label_order() {
        let db = Database::open_in_memory().expect("open");
        let october = key("2024-10-01");
        let september = key("2024-09-30");
        db.write(|tx| {
            stage(tx, &october, &["z", "a"])?;
            stage::<&str>(tx, &september, &[])?;
            Ok(())
        })
        .expect("stage");

        let all: Vec<_> = db.read(get_all).expect("all").into_iter().collect();
        assert_eq!(
            all,
            vec![
                (september, PendingChange::Clear),
                (october, PendingChange::Replace(vec!["z".into(), "a".into()])),
            ]
        );
    }

    #[test]
    fn clear_all_removes_every_date() {
        let db = Database::open_in_memory().expect("open");
        db.write(|tx| {
            stage(tx, &key("2024-06-10"), &["a"])?;
            stage::<&str>(tx, &key("2024-06-11"), &[])?;
            Ok(())
        })
        .expect("stage");

        assert_eq!(db.write(clear_all).expect("clear"), 2);
        assert!(db.read(get_all).expect("all").is_empty());

        let orphan_slots: i64 = db
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM pending_slots", [], |row| row.get(0))
                    .store_context("count")
            })
            .expect("count");
        assert_eq!(orphan_slots, 0);
    }

    #[test]
    fn serializes_as_tagged_variant() {
        let json = serde_json::to_value(PendingChange::Replace(vec!["a".into()])).expect("json");
        assert_eq!(json, serde_json::json!({"action": "replace", "slots": ["a"]}));
        let json = serde_json::to_value(PendingChange::Clear).expect("json");
        assert_eq!(json, serde_json::json!({"action": "clear"}));
    }
}
