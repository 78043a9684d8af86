//! `rota import`: load a legacy JSON ledger into the SQLite ledger.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use rota_core::config;
use rota_core::db::SqliteStore;
use rota_core::db::import::{import_legacy, parse_legacy_ledger};

use super::{Invocation, load_config, lock_ledger};
use crate::output::render;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON array or JSON-lines file of old assignment entries.
    pub file: PathBuf,
}

/// Execute `rota import`.
pub fn run_import(args: &ImportArgs, inv: &Invocation<'_>) -> anyhow::Result<()> {
    load_config(inv)?;
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let entries = parse_legacy_ledger(&content)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    let _lock = lock_ledger(inv)?;
    let mut store = SqliteStore::open(&config::ledger_path(inv.root))?;
    let report = import_legacy(&mut store, &entries)?;
    tracing::info!(
        imported = report.imported,
        skipped = report.skipped.len(),
        file = %args.file.display(),
        "legacy import finished"
    );

    render(inv.output, &report, |r, w| {
        writeln!(w, "✓ Imported {} record(s).", r.imported)?;
        for (index, reason) in &r.skipped {
            writeln!(w, "  skipped entry {index}: {reason}")?;
        }
        Ok(())
    })
}
