//! Default slot labels for a calendar date.

use chrono::{Datelike, NaiveDate, Weekday};

/// Display label of a bookable time window, e.g. `16:50〜18:00`.
pub type SlotLabel = String;

/// Labels seeded for Saturdays and Sundays.
pub const WEEKEND_SLOTS: [&str; 2] = ["12:30~14:30", "14:30~16:30"];

/// Labels seeded for Monday through Friday.
pub const WEEKDAY_SLOTS: [&str; 2] = ["〜16:50", "16:50〜18:00"];

#[must_use]
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Default ordered slot labels for `date`.
#[must_use]
pub fn default_slots(date: NaiveDate) -> Vec<SlotLabel> {
    let labels = if is_weekend(date) {
        WEEKEND_SLOTS
    } else {
        WEEKDAY_SLOTS
    };
    labels.iter().map(ToString::to_string).collect()
}

/// Trim labels, drop blank ones, and drop repeats while keeping the first
/// occurrence. The result is what a store persists for a date.
#[must_use]
pub fn normalize_labels<S: AsRef<str>>(labels: &[S]) -> Vec<SlotLabel> {
    let mut out: Vec<SlotLabel> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.as_ref().trim();
        if label.is_empty() || out.iter().any(|seen| seen == label) {
            continue;
        }
        out.push(label.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn saturday_gets_weekend_slots() {
        assert_eq!(
            default_slots(ymd(2024, 6, 1)),
            vec!["12:30~14:30".to_string(), "14:30~16:30".to_string()]
        );
    }

    #[test]
    fn sunday_gets_weekend_slots() {
        assert_eq!(default_slots(ymd(2024, 6, 2)), default_slots(ymd(2024, 6, 1)));
    }

    #[test]
    fn monday_gets_weekday_slots() {
        assert_eq!(
            default_slots(ymd(2024, 6, 3)),
            vec!["〜16:50".to_string(), "16:50〜18:00".to_string()]
        );
    }

    #[test]
    fn friday_is_a_weekday() {
        assert!(!is_weekend(ymd(2024, 6, 7)));
        assert_eq!(default_slots(ymd(2024, 6, 7))[0], "〜16:50");
    }

    #[test]
    fn normalize_keeps_first_occurrence_order() {
        let labels = ["b", " a ", "b", "", "  ", "c", "a"];
        assert_eq!(normalize_labels(&labels), vec!["b", "a", "c"]);
    }
}
