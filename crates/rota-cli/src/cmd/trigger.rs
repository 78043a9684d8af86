//! `rota trigger`: ask for an on-demand chore ("the trash is full").

use std::io::Write;

use clap::Args;
use rota_core::model::AssignmentRecord;
use rota_core::model::person::display_name;
use serde::Serialize;

use super::{Invocation, fail, lock_ledger, open_household, require_person, rng};
use crate::notifier::Delivery;
use crate::output::render;

#[derive(Args, Debug)]
pub struct TriggerArgs {
    /// Free-text request naming a chore title or category.
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,

    /// Seed the tie-break generator.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct TriggerOutput {
    record: AssignmentRecord,
    assignee_names: Vec<String>,
    messages: Vec<Delivery>,
}

/// Execute `rota trigger`. Unmatched requests are reported and write
/// nothing.
pub fn run_trigger(args: &TriggerArgs, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let requester = require_person(inv)?;
    let _lock = lock_ledger(inv)?;
    let mut household = open_household(inv)?;
    let mut rng = rng(args.seed);

    let record = household
        .trigger(&args.text.join(" "), &requester, inv.now, &mut rng)
        .map_err(|err| fail(inv.output, err))?;
    let assignee_names = record
        .assignees
        .iter()
        .map(|id| display_name(&household.config().people, id).to_string())
        .collect();
    let (_, notifier) = household.into_parts();
    let payload = TriggerOutput {
        record,
        assignee_names,
        messages: notifier.into_outbox(),
    };

    render(inv.output, &payload, |p, w| {
        writeln!(
            w,
            "✓ '{}' goes to {}",
            p.record.chore_title,
            p.assignee_names.join(", ")
        )
    })
}
