//! `rota status`: who has what this cycle, and how far along it is.

use std::io::Write;

use clap::Args;
use rota_core::model::person::display_name;
use rota_core::model::{AssignmentRecord, CompletionState};
use serde::Serialize;

use super::{CliHousehold, Invocation, fail, format_due, open_household};
use crate::output::{pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Only show chores still waiting on someone.
    #[arg(long)]
    pub open: bool,
}

#[derive(Debug, Serialize)]
struct StatusRow {
    id: i64,
    chore: String,
    state: CompletionState,
    assignees: Vec<String>,
    waiting_on: Vec<String>,
    due: String,
    adhoc: bool,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    cycle: String,
    records: Vec<StatusRow>,
}

fn row(household: &CliHousehold, record: &AssignmentRecord) -> StatusRow {
    let people = &household.config().people;
    StatusRow {
        id: record.id.0,
        chore: record.chore_title.clone(),
        state: record.state(),
        assignees: record
            .assignees
            .iter()
            .map(|id| display_name(people, id).to_string())
            .collect(),
        waiting_on: record
            .waiting_on()
            .into_iter()
            .map(|id| display_name(people, id).to_string())
            .collect(),
        due: format_due(household, record.due_at_us),
        adhoc: record.is_adhoc(),
    }
}

/// Execute `rota status`.
pub fn run_status(args: &StatusArgs, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let household = open_household(inv)?;
    let records = household
        .status(inv.now)
        .map_err(|err| fail(inv.output, err))?;
    let payload = StatusOutput {
        cycle: household.cycle_at(inv.now),
        records: records
            .iter()
            .filter(|record| !args.open || !record.completed)
            .map(|record| row(&household, record))
            .collect(),
    };

    render_mode(
        inv.output,
        &payload,
        |p, w| {
            for r in &p.records {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}",
                    r.id,
                    r.chore,
                    r.state,
                    r.assignees.join(","),
                    r.due
                )?;
            }
            Ok(())
        },
        |p, w| {
            pretty_section(w, &format!("Chores for {}", p.cycle))?;
            if p.records.is_empty() {
                writeln!(w, "Nothing assigned yet. Run `rota assign`.")?;
            }
            for r in &p.records {
                let mark = match r.state {
                    CompletionState::Done => "✓",
                    CompletionState::PartiallyDone => "◐",
                    CompletionState::Pending => "·",
                };
                let tag = if r.adhoc { " [on request]" } else { "" };
                writeln!(w, "{mark} {}{tag}  (due {})", r.chore, r.due)?;
                writeln!(w, "    {}", r.assignees.join(", "))?;
                if r.state == CompletionState::PartiallyDone {
                    writeln!(w, "    waiting on {}", r.waiting_on.join(", "))?;
                }
            }
            pretty_rule(w)
        },
    )
}
