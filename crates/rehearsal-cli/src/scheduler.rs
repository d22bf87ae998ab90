//! Weekly cutover timer.
//!
//! Sleeps until the next configured instant, runs a scheduled cutover on the
//! blocking pool, and repeats. Firings missed while the process was down are
//! not replayed; the next one is simply computed from the current time.

use chrono::NaiveDateTime;
use rehearsal_core::cutover::{CutoverEngine, Trigger};
use rehearsal_core::schedule::WeeklySchedule;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Next firing and the sleep until it. `last_fired` keeps a wake-up that
/// lands a hair before the target from firing the same instant twice.
pub fn plan(
    schedule: &WeeklySchedule,
    now: NaiveDateTime,
    last_fired: Option<NaiveDateTime>,
) -> (NaiveDateTime, Duration) {
    let anchor = last_fired.map_or(now, |fired| fired.max(now));
    let next = schedule.next_after(anchor);
    let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
    (next, wait)
}

/// Run until `shutdown` flips to `true` or its sender is dropped.
pub async fn run(
    engine: CutoverEngine,
    schedule: WeeklySchedule,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(%schedule, "weekly cutover scheduler started");
    let mut last_fired = None;

    loop {
        let (next, wait) = plan(&schedule, engine.clock().now(), last_fired);
        info!(next = %next, "next weekly cutover");

        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                info!("weekly cutover scheduler stopping");
                return;
            }
        }

        last_fired = Some(next);
        let worker = engine.clone();
        match tokio::task::spawn_blocking(move || worker.apply(Trigger::Scheduled)).await {
            Ok(Ok(report)) => info!(
                promoted = report.promoted.len(),
                seeded = report.seeded.len(),
                "scheduled cutover finished"
            ),
            Ok(Err(err)) => error!(code = %err.code(), error = %err, "scheduled cutover failed"),
            Err(err) => error!(error = %err, "scheduled cutover task aborted"),
        }
    }
}
