//! `rota stats`: workload credit per person.

use std::io::Write;

use clap::Args;
use rota_core::stats::{PersonStats, format_credit};
use serde::Serialize;

use super::{Invocation, fail, open_household};
use crate::output::{pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct StatsArgs {
    /// Count the whole ledger instead of the fairness window.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct StatsOutput {
    window: &'static str,
    people: Vec<PersonStats>,
}

/// Execute `rota stats`.
pub fn run_stats(args: &StatsArgs, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let household = open_household(inv)?;
    let people = household
        .stats(inv.now, args.all)
        .map_err(|err| fail(inv.output, err))?;
    let payload = StatsOutput {
        window: if args.all { "all" } else { "fairness" },
        people,
    };

    render_mode(
        inv.output,
        &payload,
        |p, w| {
            writeln!(w, "PERSON\tASSIGNED\tCOMPLETED")?;
            for s in &p.people {
                writeln!(
                    w,
                    "{}\t{}\t{}",
                    s.person,
                    format_credit(s.assigned),
                    format_credit(s.completed)
                )?;
            }
            Ok(())
        },
        |p, w| {
            let heading = if args.all {
                "Credit (all time)"
            } else {
                "Credit (fairness window)"
            };
            pretty_section(w, heading)?;
            for s in &p.people {
                writeln!(
                    w,
                    "{:<16} {:>7} assigned  {:>7} done",
                    s.display_name,
                    format_credit(s.assigned),
                    format_credit(s.completed)
                )?;
            }
            Ok(())
        },
    )
}
