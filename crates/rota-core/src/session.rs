//! Expiring sessions for the "choose who shares this chore" interaction.
//!
//! A session is keyed by the person who started it and the chore category,
//! so one person can run separate selections for different chores. Expiry
//! is fixed at start time and is not extended by activity.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::model::PersonId;

/// Default session lifetime, in minutes.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub initiator: PersonId,
    pub category: String,
}

impl SessionKey {
    #[must_use]
    pub fn new(initiator: PersonId, category: &str) -> Self {
        Self {
            initiator,
            category: category.trim().to_lowercase(),
        }
    }
}

/// An in-progress selection of assignees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSession {
    pub chore_title: String,
    pub selected: Vec<PersonId>,
    pub started_at_us: i64,
    pub expires_at_us: i64,
}

impl ShareSession {
    #[must_use]
    pub const fn is_expired(&self, now_us: i64) -> bool {
        now_us >= self.expires_at_us
    }
}

#[derive(Debug, Clone)]
pub struct SessionMap {
    sessions: BTreeMap<SessionKey, ShareSession>,
    ttl: Duration,
}

impl Default for SessionMap {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_SESSION_TTL_MINUTES))
    }
}

impl SessionMap {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: BTreeMap::new(),
            ttl,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Start (or restart) a selection. Any previous session under the same
    /// key is discarded.
    pub fn start(
        &mut self,
        key: SessionKey,
        chore_title: impl Into<String>,
        now_us: i64,
    ) -> &ShareSession {
        let ttl_us = self.ttl.num_microseconds().unwrap_or(i64::MAX);
        let session = ShareSession {
            chore_title: chore_title.into(),
            selected: Vec::new(),
            started_at_us: now_us,
            expires_at_us: now_us.saturating_add(ttl_us),
        };
        tracing::debug!(initiator = %key.initiator, category = %key.category, "share session started");
        self.sessions.insert(key.clone(), session);
        &self.sessions[&key]
    }

    /// Add `person` to the selection, or remove them if already selected.
    ///
    /// Returns `None` when there is no live session for `key`.
    pub fn toggle(
        &mut self,
        key: &SessionKey,
        person: PersonId,
        now_us: i64,
    ) -> Option<&ShareSession> {
        let session = self
            .sessions
            .get_mut(key)
            .filter(|session| !session.is_expired(now_us))?;
        if let Some(pos) = session.selected.iter().position(|p| *p == person) {
            session.selected.remove(pos);
        } else {
            session.selected.push(person);
        }
        Some(&*session)
    }

    /// Finish the selection and remove the session.
    ///
    /// Returns `None` if the session is missing or expired. Expired sessions
    /// are dropped either way.
    pub fn confirm(&mut self, key: &SessionKey, now_us: i64) -> Option<ShareSession> {
        let session = self.sessions.remove(key)?;
        if session.is_expired(now_us) {
            tracing::debug!(initiator = %key.initiator, "share session expired before confirm");
            return None;
        }
        Some(session)
    }

    /// Abandon a selection. Returns whether a session existed.
    pub fn cancel(&mut self, key: &SessionKey) -> bool {
        self.sessions.remove(key).is_some()
    }

    /// Drop every expired session, returning how many were removed.
    pub fn evict_expired(&mut self, now_us: i64) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired(now_us));
        before - self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE_US: i64 = 60_000_000;

    fn key(initiator: &str, category: &str) -> SessionKey {
        SessionKey::new(initiator.into(), category)
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut sessions = SessionMap::default();
        sessions.start(key("ana", "kitchen"), "Deep clean kitchen", 0);

        let k = key("ana", "kitchen");
        sessions.toggle(&k, "bo".into(), 1).expect("live");
        sessions.toggle(&k, "cy".into(), 2).expect("live");
        let session = sessions.toggle(&k, "bo".into(), 3).expect("live");
        assert_eq!(session.selected, vec![PersonId::from("cy")]);
    }

    #[test]
    fn keys_are_per_initiator_and_category() {
        let mut sessions = SessionMap::default();
        sessions.start(key("ana", "Kitchen"), "Deep clean kitchen", 0);
        sessions.start(key("ana", "garden"), "Weed garden", 0);
        sessions.start(key("bo", "kitchen"), "Deep clean kitchen", 0);
        assert_eq!(sessions.len(), 3);
        assert!(sessions.toggle(&key("ana", " KITCHEN "), "bo".into(), 1).is_some());
    }

    #[test]
    fn confirm_consumes_the_session() {
        let mut sessions = SessionMap::default();
        let k = key("ana", "kitchen");
        sessions.start(k.clone(), "Deep clean kitchen", 0);
        sessions.toggle(&k, "ana".into(), 1);
        let done = sessions.confirm(&k, 2).expect("live");
        assert_eq!(done.selected, vec![PersonId::from("ana")]);
        assert!(sessions.is_empty());
        assert!(sessions.confirm(&k, 3).is_none());
    }

    #[test]
    fn expired_sessions_refuse_interaction() {
        let mut sessions = SessionMap::new(Duration::minutes(10));
        let k = key("ana", "kitchen");
        sessions.start(k.clone(), "Deep clean kitchen", 0);

        assert!(sessions.toggle(&k, "bo".into(), 10 * MINUTE_US).is_none());
        assert!(sessions.confirm(&k, 10 * MINUTE_US).is_none());
        assert!(sessions.is_empty());
    }

    #[test]
    fn evict_removes_only_expired() {
        let mut sessions = SessionMap::new(Duration::minutes(10));
        sessions.start(key("ana", "kitchen"), "Deep clean kitchen", 0);
        sessions.start(key("bo", "kitchen"), "Deep clean kitchen", 5 * MINUTE_US);

        assert_eq!(sessions.evict_expired(12 * MINUTE_US), 1);
        assert_eq!(sessions.len(), 1);
        assert!(sessions.cancel(&key("bo", "kitchen")));
        assert!(!sessions.cancel(&key("bo", "kitchen")));
    }
}
