pub mod assign;
pub mod done;
pub mod import;
pub mod init;
pub mod remind;
pub mod share;
pub mod simulate;
pub mod stats;
pub mod status;
pub mod trigger;

use std::path::Path;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rota_core::config::{self, HouseholdConfig};
use rota_core::db::SqliteStore;
use rota_core::error::ErrorCode;
use rota_core::lock::{DEFAULT_LOCK_TIMEOUT, LedgerLock};
use rota_core::model::PersonId;
use rota_core::{Household, RotaError};

use crate::notifier::ConsoleNotifier;
use crate::output::{CliError, OutputMode, render_error};
use crate::person;

/// Everything a command needs to know about the invocation.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub root: &'a Path,
    pub output: OutputMode,
    pub person: Option<&'a str>,
    pub now: DateTime<Utc>,
}

pub type CliHousehold = Household<SqliteStore, ConsoleNotifier>;

/// Render `err` and hand it back for `?`.
pub fn fail(output: OutputMode, err: RotaError) -> anyhow::Error {
    if let Err(render_err) = render_error(output, &CliError::from(&err)) {
        tracing::warn!("failed to render error: {render_err}");
    }
    anyhow::Error::new(err)
}

/// Load the config, or explain how to create one.
pub fn load_config(inv: &Invocation<'_>) -> anyhow::Result<HouseholdConfig> {
    if !config::config_path(inv.root).is_file() {
        let code = ErrorCode::NotInitialized;
        render_error(
            inv.output,
            &CliError::with_details(
                code.message(),
                code.hint().unwrap_or_default(),
                code.code(),
            ),
        )?;
        anyhow::bail!("{} in {}", code.message(), inv.root.display());
    }
    config::load_household_config(inv.root).map_err(|err| fail(inv.output, err))
}

/// Open the household backed by the on-disk ledger.
pub fn open_household(inv: &Invocation<'_>) -> anyhow::Result<CliHousehold> {
    let config = load_config(inv)?;
    let store = SqliteStore::open(&config::ledger_path(inv.root))?;
    Household::new(config, store, ConsoleNotifier::new(inv.output))
        .map_err(|err| fail(inv.output, err))
}

/// Hold the ledger lock for the rest of a mutating command.
pub fn lock_ledger(inv: &Invocation<'_>) -> anyhow::Result<LedgerLock> {
    LedgerLock::acquire(&config::lock_path(inv.root), DEFAULT_LOCK_TIMEOUT)
        .map_err(|err| fail(inv.output, RotaError::from(err)))
}

/// Resolve who is acting, or render the missing-identity error.
pub fn require_person(inv: &Invocation<'_>) -> anyhow::Result<PersonId> {
    match person::require_person(inv.person) {
        Ok(id) => Ok(PersonId::new(id)),
        Err(e) => {
            render_error(
                inv.output,
                &CliError::with_details(&e.message, "Set --person or ROTA_PERSON", e.code),
            )?;
            anyhow::bail!("{}", e.message);
        }
    }
}

/// Seeded when reproducibility was asked for, OS entropy otherwise.
pub fn rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// Local `HH:MM` for a stored UTC microsecond timestamp.
pub fn format_due(household: &CliHousehold, due_at_us: Option<i64>) -> String {
    due_at_us
        .and_then(DateTime::from_timestamp_micros)
        .map_or_else(
            || "-".to_string(),
            |utc| household.local(utc).format("%a %H:%M").to_string(),
        )
}
