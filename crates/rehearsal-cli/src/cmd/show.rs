//! `rehearsal show <DATE>`: live slots, bookings, and any staged edit.

use super::Context;
use crate::output::{fail, kv, render, section};
use clap::Args;
use rehearsal_core::booking::{SlotView, query_date_view};
use rehearsal_core::date_key::DateKey;
use rehearsal_core::store::pending::{self, PendingChange};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Date to inspect, as YYYY-MM-DD.
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct DateReport {
    pub date_key: DateKey,
    pub slots: Vec<SlotView>,
    pub pending: PendingChange,
}

pub fn run_show(args: &ShowArgs, ctx: &Context) -> anyhow::Result<()> {
    let date_key = DateKey::parse_wire(&args.date).map_err(|err| fail(ctx.output, &err))?;
    let engine = ctx.open_engine()?;
    let db = engine.database();

    let view = query_date_view(db, &date_key).map_err(|err| fail(ctx.output, &err))?;
    let pending = db
        .read(|conn| pending::get(conn, &date_key))
        .map_err(|err| fail(ctx.output, &err))?;

    let report = DateReport {
        date_key,
        slots: view.slots,
        pending,
    };
    render(ctx.output, &report, write_report)
}

fn write_report(report: &DateReport, w: &mut dyn Write) -> io::Result<()> {
    section(w, &report.date_key.to_string())?;
    if report.slots.is_empty() {
        writeln!(w, "no live slots")?;
    }
    for slot in &report.slots {
        writeln!(w, "{}", slot.label)?;
        for user in &slot.users_booked {
            writeln!(w, "  - {} ({})", user.name, user.band_name)?;
        }
    }
    let staged = match &report.pending {
        PendingChange::NoChange => "none".to_string(),
        PendingChange::Clear => "clear at next cutover".to_string(),
        PendingChange::Replace(labels) => format!("replace with {}", labels.join(" | ")),
    };
    kv(w, "staged", staged)
}
