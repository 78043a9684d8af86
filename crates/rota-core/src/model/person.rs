use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Opaque roster identifier (a chat handle, a username, anything stable).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PersonId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl FromStr for PersonId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

/// Roster entry. Loaded once from config and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    #[serde(alias = "name")]
    pub display_name: String,
}

impl Person {
    #[must_use]
    pub fn new(id: impl Into<PersonId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Look up a display name, falling back to the raw id for people who have
/// since left the roster but still appear in the ledger.
#[must_use]
pub fn display_name<'a>(roster: &'a [Person], id: &'a PersonId) -> &'a str {
    roster
        .iter()
        .find(|person| &person.id == id)
        .map_or_else(|| id.as_str(), |person| person.display_name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_id() {
        let roster = vec![Person::new("ana", "Ana")];
        assert_eq!(display_name(&roster, &PersonId::from("ana")), "Ana");
        assert_eq!(display_name(&roster, &PersonId::from("ghost")), "ghost");
    }

    #[test]
    fn person_id_parses_trimmed() {
        let id: PersonId = "  bo ".parse().expect("infallible");
        assert_eq!(id.as_str(), "bo");
    }
}
