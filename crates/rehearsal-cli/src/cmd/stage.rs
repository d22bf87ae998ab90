//! `rehearsal stage` and `rehearsal pending`: admin edits that wait for cutover.

use super::Context;
use crate::output::{fail, render, section};
use clap::Args;
use rehearsal_core::booking::stage_slot_change;
use rehearsal_core::date_key::DateKey;
use rehearsal_core::store::pending::{self, PendingChange};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct StageArgs {
    /// Date to edit, as YYYY-MM-DD.
    pub date: String,

    /// Slot labels the date should have after the next cutover. Omit them to
    /// stage clearing the date.
    pub slots: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StagedEntry {
    pub date_key: DateKey,
    pub pending: PendingChange,
}

pub fn run_stage(args: &StageArgs, ctx: &Context) -> anyhow::Result<()> {
    let date_key = DateKey::parse_wire(&args.date).map_err(|err| fail(ctx.output, &err))?;
    let engine = ctx.open_engine()?;
    let pending = stage_slot_change(engine.database(), &date_key, &args.slots)
        .map_err(|err| fail(ctx.output, &err))?;

    render(
        ctx.output,
        &StagedEntry { date_key, pending },
        |entry, w| {
            write_entry(w, entry)?;
            writeln!(w, "applies at the next cutover (or `rehearsal apply-now`)")
        },
    )
}

pub fn run_pending(ctx: &Context) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let staged = engine
        .database()
        .read(pending::get_all)
        .map_err(|err| fail(ctx.output, &err))?;
    let entries: Vec<StagedEntry> = staged
        .into_iter()
        .map(|(date_key, pending)| StagedEntry { date_key, pending })
        .collect();

    render(ctx.output, &entries, |entries, w| {
        section(w, "Staged changes")?;
        if entries.is_empty() {
            return writeln!(w, "nothing staged");
        }
        for entry in entries {
            write_entry(w, entry)?;
        }
        Ok(())
    })
}

fn write_entry(w: &mut dyn Write, entry: &StagedEntry) -> io::Result<()> {
    match &entry.pending {
        PendingChange::Replace(labels) => {
            writeln!(w, "{:<12} replace -> {}", entry.date_key.to_string(), labels.join(" | "))
        }
        PendingChange::Clear => writeln!(w, "{:<12} clear", entry.date_key.to_string()),
        PendingChange::NoChange => writeln!(w, "{:<12} no change", entry.date_key.to_string()),
    }
}
