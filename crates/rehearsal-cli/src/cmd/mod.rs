pub mod cutover;
pub mod serve;
pub mod show;
pub mod stage;

use crate::output::OutputMode;
use anyhow::Context as _;
use rehearsal_core::config::RehearsalConfig;
use rehearsal_core::cutover::CutoverEngine;
use rehearsal_core::schedule::SystemClock;
use rehearsal_core::store::Database;
use std::path::PathBuf;
use std::sync::Arc;

/// Settings every subcommand shares, resolved once in `main`.
#[derive(Debug)]
pub struct Context {
    pub config: RehearsalConfig,
    pub db_path: PathBuf,
    pub output: OutputMode,
}

impl Context {
    /// Open the configured database behind a cutover engine on the system clock.
    pub fn open_engine(&self) -> anyhow::Result<CutoverEngine> {
        let db = Database::open(&self.db_path)
            .with_context(|| format!("Failed to open database {}", self.db_path.display()))?;
        Ok(CutoverEngine::new(db, Arc::new(SystemClock)))
    }
}
