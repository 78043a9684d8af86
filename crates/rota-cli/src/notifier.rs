//! Terminal delivery of household messages.
//!
//! Human modes print each message as it is sent. JSON mode keeps stdout for
//! the command's payload, so messages are only collected and emitted as part
//! of it.

use rota_core::error::NotificationError;
use rota_core::model::PersonId;
use rota_core::notify::Notifier;
use serde::Serialize;

use crate::output::OutputMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// Recipient id, or `None` for a household announcement.
    pub to: Option<PersonId>,
    pub message: String,
}

#[derive(Debug)]
pub struct ConsoleNotifier {
    mode: OutputMode,
    outbox: Vec<Delivery>,
}

impl ConsoleNotifier {
    pub const fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            outbox: Vec::new(),
        }
    }

    pub fn into_outbox(self) -> Vec<Delivery> {
        self.outbox
    }

    fn push(&mut self, to: Option<&PersonId>, message: &str) {
        match (self.mode, to) {
            (OutputMode::Json, _) => {}
            (_, Some(person)) => println!("→ {person}: {message}"),
            (_, None) => println!("» {message}"),
        }
        self.outbox.push(Delivery {
            to: to.cloned(),
            message: message.to_string(),
        });
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, person: &PersonId, message: &str) -> Result<(), NotificationError> {
        self.push(Some(person), message);
        Ok(())
    }

    fn announce(&mut self, message: &str) -> Result<(), NotificationError> {
        self.push(None, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_mode_collects_without_printing() {
        let mut notifier = ConsoleNotifier::new(OutputMode::Json);
        notifier
            .notify(&PersonId::from("ana"), "You're on 'Dishes' this week.")
            .expect("deliver");
        notifier.announce("Chores for 2026-W42:").expect("announce");

        let outbox = notifier.into_outbox();
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[0].to, Some(PersonId::from("ana")));
        assert_eq!(outbox[1].to, None);
    }
}
