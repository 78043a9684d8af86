use anyhow::{Context as _, Result};
use clap::Args;
use rota_core::config::{self, SAMPLE_CONFIG};
use rota_core::db::SqliteStore;
use serde::Serialize;
use std::io::Write;

use super::Invocation;
use crate::output::render;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing `.rota/config.toml`. The ledger is kept.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "rota.sqlite3\nrota.sqlite3-*\nledger.lock\n";

#[derive(Debug, Serialize)]
struct InitReport {
    config: String,
    ledger: String,
}

/// Execute `rota init`. Creates the household skeleton:
///
/// ```text
/// .rota/
///   config.toml    (sample roster and chores)
///   rota.sqlite3   (empty, migrated ledger)
///   .gitignore     (ledger and lock file)
/// ```
///
/// # Errors
///
/// Returns an error if `.rota/config.toml` exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, inv: &Invocation<'_>) -> Result<()> {
    let dir = config::rota_dir(inv.root);
    let config_path = config::config_path(inv.root);

    if config_path.exists() && !args.force {
        anyhow::bail!(".rota/config.toml already exists. Use `rota init --force` to overwrite it.");
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    std::fs::write(&config_path, SAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let ledger_path = config::ledger_path(inv.root);
    SqliteStore::open(&ledger_path)
        .with_context(|| format!("Failed to create ledger: {}", ledger_path.display()))?;
    tracing::info!(root = %inv.root.display(), "initialized household");

    let report = InitReport {
        config: config_path.display().to_string(),
        ledger: ledger_path.display().to_string(),
    };
    render(inv.output, &report, |_, w| {
        writeln!(w, "✓ Initialized .rota/ household.")?;
        writeln!(w)?;
        writeln!(w, "  Config: .rota/config.toml")?;
        writeln!(w, "  Ledger: .rota/rota.sqlite3")?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  Edit the [[people]] and [[chores]] sections, then run:")?;
        writeln!(w, "    rota assign")?;
        writeln!(w)?;
        writeln!(w, "  Tell rota who you are when confirming chores:")?;
        writeln!(w, "    export ROTA_PERSON=your-id")
    })
}
