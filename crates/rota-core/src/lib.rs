//! rota-core library.
//!
//! Fair rotation of household chores: a ledger of assignment records, an
//! allocator that evens out workload over a lookback window, and the
//! completion, reminder and ad-hoc flows built on top of them.
//!
//! # Conventions
//!
//! - **Errors**: [`error::RotaError`] for domain failures, `anyhow::Result`
//!   for file and database plumbing.
//! - **Logging**: `tracing` macros only. The binary installs the subscriber.
//! - **Time**: timestamps are UTC microseconds (`*_at_us`). Calendar logic
//!   runs in the household's configured offset.

pub mod adhoc;
pub mod allocator;
pub mod completion;
pub mod config;
pub mod cycle;
pub mod db;
pub mod due;
pub mod error;
pub mod household;
pub mod lock;
pub mod model;
pub mod notify;
pub mod reminder;
pub mod session;
pub mod stats;
pub mod store;

pub use error::{Result, RotaError};
pub use household::Household;
