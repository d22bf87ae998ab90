//! `rehearsal serve`: HTTP server plus the weekly cutover timer.

use super::Context;
use crate::{scheduler, server};
use anyhow::Context as _;
use clap::Args;
use rehearsal_core::config::resolve_listen;
use rehearsal_core::cutover::CutoverEngine;
use rehearsal_core::lock::SchedulerLock;
use rehearsal_core::schedule::WeeklySchedule;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides REHEARSAL_LISTEN and the config file).
    #[arg(long)]
    pub listen: Option<String>,
}

pub fn run_serve(args: &ServeArgs, ctx: &Context) -> anyhow::Result<()> {
    let listen = resolve_listen(
        &ctx.config,
        args.listen.clone(),
        std::env::var("REHEARSAL_LISTEN").ok(),
    );
    let schedule = if ctx.config.cutover.enabled {
        Some(ctx.config.cutover.schedule()?)
    } else {
        None
    };
    let engine = ctx.open_engine()?;

    // Fill the visible window before taking traffic; a failure here is not fatal.
    if let Err(err) = engine.initialize_default_slots() {
        warn!(code = %err.code(), error = %err, "startup default-slot seeding failed");
    }

    let scheduler_lock = match schedule {
        Some(_) => acquire_scheduler_lock(ctx),
        None => {
            info!("weekly cutover disabled by configuration");
            None
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(serve(
        engine,
        &listen,
        schedule.filter(|_| scheduler_lock.is_some()),
        ctx.config.booking.window_days,
    ))?;

    drop(scheduler_lock);
    Ok(())
}

fn acquire_scheduler_lock(ctx: &Context) -> Option<SchedulerLock> {
    let path = SchedulerLock::path_for(&ctx.db_path);
    match SchedulerLock::try_acquire(&path) {
        Ok(Some(lock)) => Some(lock),
        Ok(None) => {
            warn!(
                lock = %path.display(),
                "another process runs the weekly cutover for this database; serving without a scheduler"
            );
            None
        }
        Err(err) => {
            warn!(lock = %path.display(), error = %err, "could not take scheduler lock; serving without a scheduler");
            None
        }
    }
}

async fn serve(
    engine: CutoverEngine,
    listen: &str,
    schedule: Option<WeeklySchedule>,
    window_days: u32,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_task =
        schedule.map(|schedule| tokio::spawn(scheduler::run(engine.clone(), schedule, shutdown_rx)));

    let app = server::router(server::AppState::new(engine, window_days));
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;
    info!(addr = %listen, "booking server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("booking server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = scheduler_task {
        if let Err(err) = task.await {
            warn!(error = %err, "scheduler task ended abnormally");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => {
            warn!(error = %err, "failed to listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
