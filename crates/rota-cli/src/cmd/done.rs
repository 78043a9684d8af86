//! `rota done` and `rota pick`: confirm a chore from a person's message.

use std::io::Write;

use clap::Args;
use rota_core::completion::{CompletionOutcome, InboundMessage};
use rota_core::model::AssignmentRecord;
use serde::Serialize;

use super::{Invocation, fail, lock_ledger, open_household, require_person};
use crate::notifier::Delivery;
use crate::output::render;

#[derive(Args, Debug)]
pub struct DoneArgs {
    /// The message as the person typed it.
    #[arg(default_value = "done", num_args = 0..)]
    pub text: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PickArgs {
    /// Title of the chore being confirmed (case-insensitive).
    #[arg(required = true, num_args = 1..)]
    pub chore: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DoneOutput {
    /// `None` when the message was not a completion signal.
    outcome: Option<CompletionOutcome>,
    reply: Option<String>,
    messages: Vec<Delivery>,
}

#[derive(Debug, Serialize)]
struct PickOutput {
    record: AssignmentRecord,
    messages: Vec<Delivery>,
}

/// Execute `rota done`.
pub fn run_done(args: &DoneArgs, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let person = require_person(inv)?;
    let _lock = lock_ledger(inv)?;
    let mut household = open_household(inv)?;

    let message = InboundMessage::direct(person, args.text.join(" "));
    let handled = household
        .handle_text(&message, inv.now)
        .map_err(|err| fail(inv.output, err))?;
    let (_, notifier) = household.into_parts();
    let (outcome, reply) = handled.map_or((None, None), |h| (Some(h.outcome), Some(h.reply)));
    let payload = DoneOutput {
        outcome,
        reply,
        messages: notifier.into_outbox(),
    };

    render(inv.output, &payload, |p, w| match &p.reply {
        Some(reply) => writeln!(w, "{reply}"),
        None => writeln!(w, "Not a completion message; nothing changed."),
    })
}

/// Execute `rota pick`, the answer to a "which one did you finish?" prompt.
pub fn run_pick(args: &PickArgs, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let person = require_person(inv)?;
    let _lock = lock_ledger(inv)?;
    let mut household = open_household(inv)?;

    let record = household
        .pick(&person, &args.chore.join(" "), inv.now)
        .map_err(|err| fail(inv.output, err))?;
    let (_, notifier) = household.into_parts();
    let payload = PickOutput {
        record,
        messages: notifier.into_outbox(),
    };

    render(inv.output, &payload, |p, w| {
        writeln!(w, "✓ {} ({})", p.record.chore_title, p.record.state())
    })
}
