//! rehearsal-core library.
//!
//! Practice-room booking calendar: live slot sets per date, reservations,
//! staged slot edits, and the weekly cutover that promotes them.
//!
//! # Conventions
//!
//! - **Errors**: store and engine calls return [`Result`] with the typed
//!   [`Error`]; configuration loading uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod booking;
pub mod config;
pub mod cutover;
pub mod date_key;
pub mod error;
pub mod lock;
pub mod policy;
pub mod schedule;
pub mod store;

pub use error::{Error, ErrorCode, Result};
