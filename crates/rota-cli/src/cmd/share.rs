//! `rota share`: hand a chore to a hand-picked group.
//!
//! A chat front-end keeps the selection open across messages; from the
//! command line the whole selection arrives at once, so the session is
//! started, filled and confirmed in one go.

use std::io::Write;

use clap::Args;
use rota_core::model::{AssignmentRecord, PersonId};
use serde::Serialize;

use super::{Invocation, fail, lock_ledger, open_household, require_person};
use crate::notifier::Delivery;
use crate::output::render;

#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Chore title or category to share.
    pub category: String,

    /// Person to include. Repeat to add more; naming someone twice
    /// removes them again.
    #[arg(long = "with", value_name = "PERSON", required = true)]
    pub with: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ShareOutput {
    record: AssignmentRecord,
    messages: Vec<Delivery>,
}

/// Execute `rota share`.
pub fn run_share(args: &ShareArgs, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let initiator = require_person(inv)?;
    let _lock = lock_ledger(inv)?;
    let mut household = open_household(inv)?;

    let session = household
        .start_share(&initiator, &args.category, inv.now)
        .map_err(|err| fail(inv.output, err))?;
    tracing::debug!(chore = %session.chore_title, "share selection started");

    for person in &args.with {
        let person = PersonId::from(person.as_str());
        if let Err(err) = household.toggle_share(&initiator, &args.category, &person, inv.now) {
            household.cancel_share(&initiator, &args.category);
            return Err(fail(inv.output, err));
        }
    }

    let record = household
        .confirm_share(&initiator, &args.category, inv.now)
        .map_err(|err| fail(inv.output, err))?;
    let (_, notifier) = household.into_parts();
    let payload = ShareOutput {
        record,
        messages: notifier.into_outbox(),
    };

    render(inv.output, &payload, |p, w| {
        let ids: Vec<&str> = p.record.assignees.iter().map(PersonId::as_str).collect();
        writeln!(w, "✓ '{}' shared by {}", p.record.chore_title, ids.join(", "))
    })
}
