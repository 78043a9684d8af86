//! Outbound messaging.
//!
//! The household only ever sends two kinds of message: a direct note to
//! one person and an announcement to the shared channel. Delivery failures
//! are reported to the caller, which logs them and carries on.

use std::collections::BTreeSet;

use crate::error::NotificationError;
use crate::model::PersonId;

pub trait Notifier {
    /// Send `message` to one person.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] if delivery fails.
    fn notify(&mut self, person: &PersonId, message: &str) -> Result<(), NotificationError>;

    /// Post `message` to the whole household.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] if delivery fails.
    fn announce(&mut self, message: &str) -> Result<(), NotificationError>;
}

/// Writes every message to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, person: &PersonId, message: &str) -> Result<(), NotificationError> {
        tracing::info!(to = %person, "{message}");
        Ok(())
    }

    fn announce(&mut self, message: &str) -> Result<(), NotificationError> {
        tracing::info!(to = "household", "{message}");
        Ok(())
    }
}

/// A message captured by [`MemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Direct { to: PersonId, message: String },
    Announcement(String),
}

/// Keeps messages in memory. Deliveries to `unreachable` people fail.
#[derive(Debug, Default, Clone)]
pub struct MemoryNotifier {
    pub sent: Vec<Sent>,
    pub unreachable: BTreeSet<PersonId>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `person` fail.
    #[must_use]
    pub fn unreachable(mut self, person: impl Into<PersonId>) -> Self {
        self.unreachable.insert(person.into());
        self
    }

    #[must_use]
    pub fn announcements(&self) -> Vec<&str> {
        self.sent
            .iter()
            .filter_map(|sent| match sent {
                Sent::Announcement(message) => Some(message.as_str()),
                Sent::Direct { .. } => None,
            })
            .collect()
    }

    #[must_use]
    pub fn direct_to(&self, person: &PersonId) -> Vec<&str> {
        self.sent
            .iter()
            .filter_map(|sent| match sent {
                Sent::Direct { to, message } if to == person => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&mut self, person: &PersonId, message: &str) -> Result<(), NotificationError> {
        if self.unreachable.contains(person) {
            return Err(NotificationError::new(person.as_str(), "recipient unreachable"));
        }
        self.sent.push(Sent::Direct {
            to: person.clone(),
            message: message.to_string(),
        });
        Ok(())
    }

    fn announce(&mut self, message: &str) -> Result<(), NotificationError> {
        self.sent.push(Sent::Announcement(message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_people_fail_without_recording() {
        let mut notifier = MemoryNotifier::new().unreachable("bo");
        notifier.notify(&"ana".into(), "hi").expect("ana reachable");
        let err = notifier.notify(&"bo".into(), "hi").expect_err("bo unreachable");
        assert_eq!(err.target, "bo");
        assert_eq!(notifier.direct_to(&"ana".into()), vec!["hi"]);
        assert!(notifier.direct_to(&"bo".into()).is_empty());
    }
}
