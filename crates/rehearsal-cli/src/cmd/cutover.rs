//! `rehearsal apply-now` and `rehearsal init-slots`.

use super::Context;
use crate::output::{fail, kv, render, section};
use rehearsal_core::cutover::{CutoverReport, Trigger};
use rehearsal_core::date_key::DateKey;
use serde::Serialize;
use std::io::{self, Write};

pub fn run_apply_now(ctx: &Context) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let report = engine
        .apply(Trigger::Manual)
        .map_err(|err| fail(ctx.output, &err))?;
    render(ctx.output, &report, render_report)
}

fn render_report(report: &CutoverReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", report.summary())?;
    kv(w, "applied at", report.applied_at.format("%Y-%m-%d %H:%M").to_string())?;
    write_keys(w, "promoted", &report.promoted)?;
    write_keys(w, "seeded", &report.seeded)
}

#[derive(Debug, Serialize)]
struct InitOutput {
    seeded: Vec<DateKey>,
}

pub fn run_init_slots(ctx: &Context) -> anyhow::Result<()> {
    let engine = ctx.open_engine()?;
    let seeded = engine
        .initialize_default_slots()
        .map_err(|err| fail(ctx.output, &err))?;
    render(ctx.output, &InitOutput { seeded }, |out, w| {
        section(w, "Default slots")?;
        if out.seeded.is_empty() {
            writeln!(w, "every date in the window already has slots")
        } else {
            write_keys(w, "seeded", &out.seeded)
        }
    })
}

fn write_keys(w: &mut dyn Write, label: &str, keys: &[DateKey]) -> io::Result<()> {
    if keys.is_empty() {
        return kv(w, label, "-");
    }
    let joined = keys
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    kv(w, label, joined)
}
