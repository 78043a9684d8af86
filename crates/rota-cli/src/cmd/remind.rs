//! `rota remind`: nudge everyone whose chore falls due soon.

use std::io::Write;

use clap::Args;
use rota_core::reminder::Reminder;
use serde::Serialize;

use super::{Invocation, fail, open_household};
use crate::notifier::Delivery;
use crate::output::render;

#[derive(Args, Debug, Default)]
pub struct RemindArgs {}

#[derive(Debug, Serialize)]
struct RemindOutput {
    reminders: Vec<Reminder>,
    /// Display name per reminder, in the same order.
    recipients: Vec<String>,
    messages: Vec<Delivery>,
}

/// Execute `rota remind`. Read-only against the ledger; safe to run from
/// cron as often as the lookahead allows.
pub fn run_remind(_args: &RemindArgs, inv: &Invocation<'_>) -> anyhow::Result<()> {
    let mut household = open_household(inv)?;
    let reminders = household
        .remind(inv.now)
        .map_err(|err| fail(inv.output, err))?;
    let recipients = reminders
        .iter()
        .map(|reminder| reminder.recipient(&household.config().people).to_string())
        .collect();
    let (_, notifier) = household.into_parts();
    let payload = RemindOutput {
        reminders,
        recipients,
        messages: notifier.into_outbox(),
    };

    render(inv.output, &payload, |p, w| {
        if p.reminders.is_empty() {
            writeln!(w, "Nothing due soon.")
        } else {
            writeln!(w, "Reminded {}.", p.recipients.join(", "))
        }
    })
}
