//! `rota simulate`: dry-run the allocator over many weeks.
//!
//! Runs against an in-memory ledger seeded from the household config, with
//! every chore completed on time. Useful for checking how a config change
//! (a new chore, a different window) shifts the load.

use std::io::Write;

use chrono::Duration;
use clap::Args;
use rota_core::Household;
use rota_core::notify::LogNotifier;
use rota_core::stats::{PersonStats, format_credit};
use rota_core::store::MemoryStore;
use serde::Serialize;

use super::{Invocation, fail, load_config, rng};
use crate::output::{pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of weekly cycles to run.
    #[arg(long, default_value_t = 12)]
    pub weeks: u32,

    /// Seed the tie-break generator.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SimulateOutput {
    weeks: u32,
    records: usize,
    /// Largest minus smallest assigned credit inside the final window.
    spread: f64,
    people: Vec<PersonStats>,
}

/// Execute `rota simulate`. Never touches the on-disk ledger.
pub fn run_simulate(args: &SimulateArgs, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let config = load_config(inv)?;
    let mut household = Household::new(config, MemoryStore::new(), LogNotifier)
        .map_err(|err| fail(inv.output, err))?;
    let mut rng = rng(args.seed);

    let mut now = inv.now;
    let mut records = 0;
    for week in 0..args.weeks {
        now = inv.now + Duration::weeks(i64::from(week));
        let report = household
            .run_cycle(now, false, &mut rng)
            .map_err(|err| fail(inv.output, err))?;
        records += report.records.len();
        for record in &report.records {
            for person in &record.assignees {
                household
                    .pick(person, &record.chore_title, now)
                    .map_err(|err| fail(inv.output, err))?;
            }
        }
    }

    let people = household
        .stats(now, false)
        .map_err(|err| fail(inv.output, err))?;
    let max = people.iter().map(|s| s.assigned).fold(f64::MIN, f64::max);
    let min = people.iter().map(|s| s.assigned).fold(f64::MAX, f64::min);
    let payload = SimulateOutput {
        weeks: args.weeks,
        records,
        spread: if people.is_empty() { 0.0 } else { max - min },
        people,
    };

    render_mode(
        inv.output,
        &payload,
        |p, w| {
            writeln!(w, "weeks\t{}\nrecords\t{}\nspread\t{}", p.weeks, p.records, format_credit(p.spread))?;
            for s in &p.people {
                writeln!(w, "{}\t{}", s.person, format_credit(s.assigned))?;
            }
            Ok(())
        },
        |p, w| {
            pretty_section(
                w,
                &format!("Simulated {} week(s), {} record(s)", p.weeks, p.records),
            )?;
            for s in &p.people {
                writeln!(w, "{:<16} {:>7}", s.display_name, format_credit(s.assigned))?;
            }
            writeln!(w, "Spread in final window: {}", format_credit(p.spread))
        },
    )
}
