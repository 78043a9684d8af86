//! `rota assign`: allocate this cycle's scheduled chores.

use std::io::Write;

use clap::Args;
use rota_core::household::CycleReport;
use rota_core::model::person::display_name;
use serde::Serialize;

use super::{Invocation, fail, format_due, lock_ledger, open_household, rng};
use crate::notifier::Delivery;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Allocate again even if this cycle already has records.
    #[arg(long)]
    pub force: bool,

    /// Seed the tie-break generator for a reproducible allocation.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AssignOutput {
    #[serde(flatten)]
    report: CycleReport,
    rows: Vec<Row>,
    messages: Vec<Delivery>,
}

#[derive(Debug, Serialize)]
struct Row {
    chore: String,
    assignees: Vec<String>,
    due: String,
}

/// Execute `rota assign`.
///
/// Holds the ledger lock for the whole run so two invocations cannot both
/// see an unallocated cycle.
pub fn run_assign(args: &AssignArgs, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let _lock = lock_ledger(inv)?;
    let mut household = open_household(inv)?;
    let mut rng = rng(args.seed);

    let report = household
        .run_cycle(inv.now, args.force, &mut rng)
        .map_err(|err| fail(inv.output, err))?;

    let people = &household.config().people;
    let rows = report
        .records
        .iter()
        .map(|record| Row {
            chore: record.chore_title.clone(),
            assignees: record
                .assignees
                .iter()
                .map(|id| display_name(people, id).to_string())
                .collect(),
            due: format_due(&household, record.due_at_us),
        })
        .collect();
    let (_, notifier) = household.into_parts();
    let payload = AssignOutput {
        report,
        rows,
        messages: notifier.into_outbox(),
    };

    render_mode(
        inv.output,
        &payload,
        |p, w| {
            for row in &p.rows {
                writeln!(w, "{}\t{}\t{}", row.chore, row.assignees.join(","), row.due)?;
            }
            Ok(())
        },
        |p, w| {
            let heading = if p.report.created {
                format!("Assigned {}", p.report.cycle)
            } else {
                format!("{} already assigned (still open)", p.report.cycle)
            };
            pretty_section(w, &heading)?;
            for row in &p.rows {
                pretty_kv(w, &row.chore, format!("{}  (due {})", row.assignees.join(", "), row.due))?;
            }
            if p.report.failed_notifications > 0 {
                writeln!(w, "{} notification(s) failed; see logs.", p.report.failed_notifications)?;
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_and_force_parse() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            args: AssignArgs,
        }
        let w = Wrapper::parse_from(["test", "--force", "--seed", "7"]);
        assert!(w.args.force);
        assert_eq!(w.args.seed, Some(7));
    }
}
